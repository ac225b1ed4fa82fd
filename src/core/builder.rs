use rust_decimal::Decimal;

use super::types::*;

/// Holds issuer, recipient, line items and global-invoice data between
/// documents, and snapshots them into an [`InvoiceTree`].
///
/// Setters replace the previous value wholesale; nothing accumulates.
///
/// ```
/// use cfdi::core::*;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let mut builder = InvoiceBuilder::new();
/// builder
///     .set_issuer("EKU9003173C9", "ESCUELA KEMPER URGATE", "601")
///     .set_recipient("XAXX010101000", "PUBLICO EN GENERAL", "616", "42501", "S01")
///     .set_line_items(vec![
///         LineItemBuilder::new("01010101", dec!(1), "H87", "Venta", dec!(100))
///             .traslado("002", TipoFactor::Tasa, dec!(0.16))
///             .build(),
///     ]);
///
/// let fecha = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
/// let totals = Totals::from_line_items(builder.line_items());
/// let tree = builder.build(&InvoiceAttributes::new(fecha, "42501").totals(&totals));
///
/// assert_eq!(tree.attributes().total, dec!(116.00));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvoiceBuilder {
    issuer: Issuer,
    recipient: Recipient,
    line_items: Vec<LineItem>,
    global_info: GlobalInfo,
    certificate: Option<CertificateRef>,
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_issuer(
        &mut self,
        rfc: impl Into<String>,
        nombre: impl Into<String>,
        regimen_fiscal: impl Into<String>,
    ) -> &mut Self {
        self.issuer = Issuer {
            rfc: rfc.into(),
            nombre: nombre.into(),
            regimen_fiscal: regimen_fiscal.into(),
        };
        self
    }

    pub fn set_recipient(
        &mut self,
        rfc: impl Into<String>,
        nombre: impl Into<String>,
        regimen_fiscal: impl Into<String>,
        codigo_postal: impl Into<String>,
        uso_cfdi: impl Into<String>,
    ) -> &mut Self {
        self.recipient = Recipient {
            rfc: rfc.into(),
            nombre: nombre.into(),
            domicilio_fiscal: codigo_postal.into(),
            regimen_fiscal: regimen_fiscal.into(),
            uso_cfdi: uso_cfdi.into(),
        };
        self
    }

    pub fn set_line_items(&mut self, items: Vec<LineItem>) -> &mut Self {
        self.line_items = items;
        self
    }

    /// Mark the next documents as global invoices. An empty periodicity
    /// turns the global block off again.
    pub fn set_global_info(
        &mut self,
        periodicidad: impl Into<String>,
        meses: impl Into<String>,
        anio: impl Into<String>,
    ) -> &mut Self {
        self.global_info = GlobalInfo {
            periodicidad: periodicidad.into(),
            meses: meses.into(),
            anio: anio.into(),
        };
        self
    }

    /// Carry `NoCertificado` and `Certificado` into built documents.
    pub fn set_certificate(
        &mut self,
        numero: impl Into<String>,
        certificado: impl Into<String>,
    ) -> &mut Self {
        self.certificate = Some(CertificateRef {
            numero: numero.into(),
            certificado: certificado.into(),
        });
        self
    }

    pub fn clear_certificate(&mut self) -> &mut Self {
        self.certificate = None;
        self
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

    pub fn global_info(&self) -> &GlobalInfo {
        &self.global_info
    }

    /// Snapshot the current state together with `attributes`.
    ///
    /// Calling this repeatedly without touching the setters yields equal trees.
    pub fn build(&self, attributes: &InvoiceAttributes) -> InvoiceTree {
        let global_info = self
            .global_info
            .is_present()
            .then(|| self.global_info.clone());
        InvoiceTree::new(
            attributes.clone(),
            global_info,
            self.issuer.clone(),
            self.recipient.clone(),
            self.line_items.clone(),
            self.certificate.clone(),
        )
    }
}

/// Builder for [`LineItem`].
pub struct LineItemBuilder {
    clave_prod_serv: String,
    no_identificacion: Option<String>,
    cantidad: Decimal,
    clave_unidad: String,
    unidad: Option<String>,
    descripcion: String,
    valor_unitario: Decimal,
    importe: Option<Decimal>,
    descuento: Option<Decimal>,
    objeto_imp: String,
    impuesto: Option<TaxDescriptor>,
}

impl LineItemBuilder {
    pub fn new(
        clave_prod_serv: impl Into<String>,
        cantidad: Decimal,
        clave_unidad: impl Into<String>,
        descripcion: impl Into<String>,
        valor_unitario: Decimal,
    ) -> Self {
        Self {
            clave_prod_serv: clave_prod_serv.into(),
            no_identificacion: None,
            cantidad,
            clave_unidad: clave_unidad.into(),
            unidad: None,
            descripcion: descripcion.into(),
            valor_unitario,
            importe: None,
            descuento: None,
            objeto_imp: OBJETO_IMP_SI.to_string(),
            impuesto: None,
        }
    }

    pub fn no_identificacion(mut self, id: impl Into<String>) -> Self {
        self.no_identificacion = Some(id.into());
        self
    }

    pub fn unidad(mut self, unidad: impl Into<String>) -> Self {
        self.unidad = Some(unidad.into());
        self
    }

    /// Override the computed `cantidad × valor_unitario`.
    pub fn importe(mut self, importe: Decimal) -> Self {
        self.importe = Some(importe);
        self
    }

    pub fn descuento(mut self, descuento: Decimal) -> Self {
        self.descuento = Some(descuento);
        self
    }

    pub fn objeto_imp(mut self, code: impl Into<String>) -> Self {
        self.objeto_imp = code.into();
        self
    }

    pub fn traslado(
        mut self,
        impuesto: impl Into<String>,
        tipo_factor: TipoFactor,
        tasa_o_cuota: Decimal,
    ) -> Self {
        self.impuesto = Some(TaxDescriptor {
            impuesto: impuesto.into(),
            tipo_factor,
            tasa_o_cuota,
        });
        self
    }

    pub fn build(self) -> LineItem {
        let importe = self.importe.unwrap_or_else(|| {
            round_amount(self.cantidad.saturating_mul(self.valor_unitario))
        });
        LineItem {
            clave_prod_serv: self.clave_prod_serv,
            no_identificacion: self.no_identificacion,
            cantidad: self.cantidad,
            clave_unidad: self.clave_unidad,
            unidad: self.unidad,
            descripcion: self.descripcion,
            valor_unitario: self.valor_unitario,
            importe,
            descuento: self.descuento,
            objeto_imp: self.objeto_imp,
            impuesto: self.impuesto,
        }
    }
}
