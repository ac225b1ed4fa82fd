use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// `ObjetoImp` value for items that are subject to tax.
pub const OBJETO_IMP_SI: &str = "02";

/// `Emisor`: the party issuing the invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    /// `Rfc`: Registro Federal de Contribuyentes.
    pub rfc: String,
    /// `Nombre`: legal name as registered with SAT.
    pub nombre: String,
    /// `RegimenFiscal`: c_RegimenFiscal code.
    pub regimen_fiscal: String,
}

/// `Receptor`: the party the invoice is issued to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// `Rfc`.
    pub rfc: String,
    /// `Nombre`.
    pub nombre: String,
    /// `DomicilioFiscalReceptor`: postal code of the fiscal domicile.
    pub domicilio_fiscal: String,
    /// `RegimenFiscalReceptor`.
    pub regimen_fiscal: String,
    /// `UsoCFDI`: c_UsoCFDI code.
    pub uso_cfdi: String,
}

/// c_TipoFactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TipoFactor {
    Tasa,
    Cuota,
    Exento,
}

impl TipoFactor {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tasa => "Tasa",
            Self::Cuota => "Cuota",
            Self::Exento => "Exento",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Tasa" => Some(Self::Tasa),
            "Cuota" => Some(Self::Cuota),
            "Exento" => Some(Self::Exento),
            _ => None,
        }
    }
}

/// Tax descriptor attached to a line item (a transferred tax, *traslado*).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDescriptor {
    /// `Impuesto`: c_Impuesto code ("002" = IVA).
    pub impuesto: String,
    /// `TipoFactor`.
    pub tipo_factor: TipoFactor,
    /// `TasaOCuota`, e.g. 0.16. Ignored for [`TipoFactor::Exento`].
    pub tasa_o_cuota: Decimal,
}

/// `Concepto`: one invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// `ClaveProdServ`: c_ClaveProdServ code.
    pub clave_prod_serv: String,
    /// `NoIdentificacion`: issuer's internal identifier.
    pub no_identificacion: Option<String>,
    /// `Cantidad`.
    pub cantidad: Decimal,
    /// `ClaveUnidad`: c_ClaveUnidad code.
    pub clave_unidad: String,
    /// `Unidad`: free text unit label.
    pub unidad: Option<String>,
    /// `Descripcion`.
    pub descripcion: String,
    /// `ValorUnitario`.
    pub valor_unitario: Decimal,
    /// `Importe`: cantidad × valor unitario.
    pub importe: Decimal,
    /// `Descuento`.
    pub descuento: Option<Decimal>,
    /// `ObjetoImp`: c_ObjetoImp code.
    pub objeto_imp: String,
    /// Transferred tax, emitted only when `objeto_imp` is "02".
    pub impuesto: Option<TaxDescriptor>,
}

impl LineItem {
    /// Amount the transferred tax is computed on: importe minus descuento.
    pub fn tax_base(&self) -> Decimal {
        self.importe
            .saturating_sub(self.descuento.unwrap_or(Decimal::ZERO))
    }

    /// The traslado for this line, if the line is subject to tax.
    pub fn transfer(&self) -> Option<TaxLine> {
        if self.objeto_imp != OBJETO_IMP_SI {
            return None;
        }
        let tax = self.impuesto.as_ref()?;
        let base = self.tax_base();
        let (tasa_o_cuota, importe) = match tax.tipo_factor {
            TipoFactor::Exento => (None, None),
            TipoFactor::Tasa | TipoFactor::Cuota => (
                Some(tax.tasa_o_cuota),
                Some(round_amount(base.saturating_mul(tax.tasa_o_cuota))),
            ),
        };
        Some(TaxLine {
            base,
            impuesto: tax.impuesto.clone(),
            tipo_factor: tax.tipo_factor,
            tasa_o_cuota,
            importe,
        })
    }
}

/// Round a monetary amount to centavos, midpoint away from zero.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A computed `cfdi:Traslado`, either per line or aggregated per document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    pub base: Decimal,
    pub impuesto: String,
    pub tipo_factor: TipoFactor,
    pub tasa_o_cuota: Option<Decimal>,
    pub importe: Option<Decimal>,
}

/// Document level `cfdi:Impuestos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSummary {
    /// Traslados grouped by impuesto, tipo factor and rate, in first-seen order.
    pub traslados: Vec<TaxLine>,
    /// `TotalImpuestosTrasladados`; absent when every traslado is exempt.
    pub total_trasladados: Option<Decimal>,
}

impl TaxSummary {
    /// Aggregate the traslados of `items`. `None` if no item transfers tax.
    pub fn from_line_items(items: &[LineItem]) -> Option<Self> {
        let mut traslados: Vec<TaxLine> = Vec::new();
        for line in items.iter().filter_map(LineItem::transfer) {
            let existing = traslados.iter_mut().find(|t| {
                t.impuesto == line.impuesto
                    && t.tipo_factor == line.tipo_factor
                    && t.tasa_o_cuota == line.tasa_o_cuota
            });
            match existing {
                Some(t) => {
                    t.base = t.base.saturating_add(line.base);
                    t.importe = match (t.importe, line.importe) {
                        (Some(a), Some(b)) => Some(a.saturating_add(b)),
                        (a, b) => a.or(b),
                    };
                }
                None => traslados.push(line),
            }
        }
        if traslados.is_empty() {
            return None;
        }
        let total_trasladados = traslados
            .iter()
            .filter_map(|t| t.importe)
            .reduce(Decimal::saturating_add);
        Some(Self {
            traslados,
            total_trasladados,
        })
    }
}

/// `InformacionGlobal`: only for global (público en general) invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalInfo {
    /// `Periodicidad`: c_Periodicidad code. Empty means "not global".
    pub periodicidad: String,
    /// `Meses`: c_Meses code.
    pub meses: String,
    /// `Año`.
    pub anio: String,
}

impl GlobalInfo {
    pub fn is_present(&self) -> bool {
        !self.periodicidad.trim().is_empty()
    }
}

/// Per-document attributes of `cfdi:Comprobante`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAttributes {
    /// `Version`, "4.0".
    pub version: String,
    pub serie: Option<String>,
    pub folio: Option<String>,
    /// `Fecha`, local time of issue, no offset.
    pub fecha: NaiveDateTime,
    /// `FormaPago`: c_FormaPago code.
    pub forma_pago: Option<String>,
    pub condiciones_de_pago: Option<String>,
    pub sub_total: Decimal,
    pub descuento: Option<Decimal>,
    /// `Moneda`: c_Moneda code.
    pub moneda: String,
    pub tipo_cambio: Option<Decimal>,
    pub total: Decimal,
    /// `TipoDeComprobante`: "I" for ingreso.
    pub tipo_de_comprobante: String,
    /// `Exportacion`: c_Exportacion code.
    pub exportacion: String,
    /// `MetodoPago`: "PUE" or "PPD".
    pub metodo_pago: Option<String>,
    /// `LugarExpedicion`: postal code of the place of issue.
    pub lugar_expedicion: String,
    pub confirmacion: Option<String>,
}

impl InvoiceAttributes {
    /// Ingreso in MXN, not an export, zero totals.
    pub fn new(fecha: NaiveDateTime, lugar_expedicion: impl Into<String>) -> Self {
        Self {
            version: crate::core::CFDI_VERSION.to_string(),
            serie: None,
            folio: None,
            fecha,
            forma_pago: None,
            condiciones_de_pago: None,
            sub_total: Decimal::ZERO,
            descuento: None,
            moneda: "MXN".to_string(),
            tipo_cambio: None,
            total: Decimal::ZERO,
            tipo_de_comprobante: "I".to_string(),
            exportacion: "01".to_string(),
            metodo_pago: None,
            lugar_expedicion: lugar_expedicion.into(),
            confirmacion: None,
        }
    }

    pub fn serie(mut self, serie: impl Into<String>) -> Self {
        self.serie = Some(serie.into());
        self
    }

    pub fn folio(mut self, folio: impl Into<String>) -> Self {
        self.folio = Some(folio.into());
        self
    }

    pub fn forma_pago(mut self, code: impl Into<String>) -> Self {
        self.forma_pago = Some(code.into());
        self
    }

    pub fn metodo_pago(mut self, code: impl Into<String>) -> Self {
        self.metodo_pago = Some(code.into());
        self
    }

    pub fn condiciones_de_pago(mut self, text: impl Into<String>) -> Self {
        self.condiciones_de_pago = Some(text.into());
        self
    }

    pub fn moneda(mut self, code: impl Into<String>, tipo_cambio: Option<Decimal>) -> Self {
        self.moneda = code.into();
        self.tipo_cambio = tipo_cambio;
        self
    }

    pub fn exportacion(mut self, code: impl Into<String>) -> Self {
        self.exportacion = code.into();
        self
    }

    pub fn confirmacion(mut self, code: impl Into<String>) -> Self {
        self.confirmacion = Some(code.into());
        self
    }

    /// Set `SubTotal`, `Descuento` and `Total`.
    pub fn totals(mut self, totals: &Totals) -> Self {
        self.sub_total = totals.sub_total;
        self.descuento = totals.descuento;
        self.total = totals.total;
        self
    }
}

/// Amounts derived from line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of `Importe`.
    pub sub_total: Decimal,
    /// Sum of `Descuento`, present if any line carries one.
    pub descuento: Option<Decimal>,
    /// Sum of transferred tax amounts.
    pub impuestos_trasladados: Decimal,
    /// `SubTotal - Descuento + impuestos trasladados`.
    pub total: Decimal,
}

impl Totals {
    pub fn from_line_items(items: &[LineItem]) -> Self {
        let sub_total = items
            .iter()
            .map(|i| i.importe)
            .fold(Decimal::ZERO, Decimal::saturating_add);
        let descuento = items
            .iter()
            .filter_map(|i| i.descuento)
            .reduce(Decimal::saturating_add);
        let impuestos_trasladados = TaxSummary::from_line_items(items)
            .and_then(|s| s.total_trasladados)
            .unwrap_or(Decimal::ZERO);
        let total = sub_total
            .saturating_sub(descuento.unwrap_or(Decimal::ZERO))
            .saturating_add(impuestos_trasladados);
        Self {
            sub_total,
            descuento,
            impuestos_trasladados,
            total,
        }
    }
}

/// `NoCertificado` and `Certificado` carried into the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRef {
    /// `NoCertificado`: the decoded certificate serial.
    pub numero: String,
    /// `Certificado`: base64 DER body of the certificate.
    pub certificado: String,
}

/// `Comprobante`: an immutable snapshot of everything one generation call needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTree {
    attributes: InvoiceAttributes,
    global_info: Option<GlobalInfo>,
    issuer: Issuer,
    recipient: Recipient,
    line_items: Vec<LineItem>,
    certificate: Option<CertificateRef>,
    taxes: Option<TaxSummary>,
}

impl InvoiceTree {
    pub(crate) fn new(
        attributes: InvoiceAttributes,
        global_info: Option<GlobalInfo>,
        issuer: Issuer,
        recipient: Recipient,
        line_items: Vec<LineItem>,
        certificate: Option<CertificateRef>,
    ) -> Self {
        let taxes = TaxSummary::from_line_items(&line_items);
        Self {
            attributes,
            global_info,
            issuer,
            recipient,
            line_items,
            certificate,
            taxes,
        }
    }

    pub fn attributes(&self) -> &InvoiceAttributes {
        &self.attributes
    }

    pub fn global_info(&self) -> Option<&GlobalInfo> {
        self.global_info.as_ref()
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn certificate(&self) -> Option<&CertificateRef> {
        self.certificate.as_ref()
    }

    pub fn taxes(&self) -> Option<&TaxSummary> {
        self.taxes.as_ref()
    }
}
