use super::writer::{Attrs, XmlWriter, format_decimal, format_rate};
use super::{CFDI_SCHEMA_LOCATION, FECHA_FORMAT, ns};
use crate::core::*;

/// Render an invoice tree as unsealed CFDI 4.0 XML.
///
/// Optional attributes are left out entirely when absent. The result carries
/// no `Sello`; see `sello::Sealer` for that.
pub fn render(tree: &InvoiceTree) -> Result<String, XmlError> {
    let a = tree.attributes();
    let cert = tree.certificate();
    let mut w = XmlWriter::new()?;

    let root = Attrs::new()
        .req("xmlns:cfdi", ns::CFDI)
        .req("xmlns:xsi", ns::XSI)
        .req("xsi:schemaLocation", CFDI_SCHEMA_LOCATION)
        .req("Version", a.version.as_str())
        .opt("Serie", a.serie.as_deref())
        .opt("Folio", a.folio.as_deref())
        .req("Fecha", a.fecha.format(FECHA_FORMAT).to_string())
        .opt("FormaPago", a.forma_pago.as_deref())
        .opt("NoCertificado", cert.map(|c| c.numero.as_str()))
        .opt("Certificado", cert.map(|c| c.certificado.as_str()))
        .opt("CondicionesDePago", a.condiciones_de_pago.as_deref())
        .req("SubTotal", format_decimal(a.sub_total))
        .opt("Descuento", a.descuento.map(format_decimal))
        .req("Moneda", a.moneda.as_str())
        .opt("TipoCambio", a.tipo_cambio.map(|t| t.normalize().to_string()))
        .req("Total", format_decimal(a.total))
        .req("TipoDeComprobante", a.tipo_de_comprobante.as_str())
        .req("Exportacion", a.exportacion.as_str())
        .opt("MetodoPago", a.metodo_pago.as_deref())
        .req("LugarExpedicion", a.lugar_expedicion.as_str())
        .opt("Confirmacion", a.confirmacion.as_deref());
    w.start_element("cfdi:Comprobante", &root)?;

    if let Some(global) = tree.global_info() {
        w.empty_element(
            "cfdi:InformacionGlobal",
            &Attrs::new()
                .req("Periodicidad", global.periodicidad.as_str())
                .req("Meses", global.meses.as_str())
                .req("Año", global.anio.as_str()),
        )?;
    }

    let issuer = tree.issuer();
    w.empty_element(
        "cfdi:Emisor",
        &Attrs::new()
            .req("Rfc", issuer.rfc.as_str())
            .req("Nombre", issuer.nombre.as_str())
            .req("RegimenFiscal", issuer.regimen_fiscal.as_str()),
    )?;

    let recipient = tree.recipient();
    w.empty_element(
        "cfdi:Receptor",
        &Attrs::new()
            .req("Rfc", recipient.rfc.as_str())
            .req("Nombre", recipient.nombre.as_str())
            .req("DomicilioFiscalReceptor", recipient.domicilio_fiscal.as_str())
            .req("RegimenFiscalReceptor", recipient.regimen_fiscal.as_str())
            .req("UsoCFDI", recipient.uso_cfdi.as_str()),
    )?;

    w.start_element("cfdi:Conceptos", &Attrs::new())?;
    for item in tree.line_items() {
        write_concepto(&mut w, item)?;
    }
    w.end_element("cfdi:Conceptos")?;

    if let Some(taxes) = tree.taxes() {
        w.start_element(
            "cfdi:Impuestos",
            &Attrs::new().opt(
                "TotalImpuestosTrasladados",
                taxes.total_trasladados.map(format_decimal),
            ),
        )?;
        write_traslados(&mut w, &taxes.traslados)?;
        w.end_element("cfdi:Impuestos")?;
    }

    w.end_element("cfdi:Comprobante")?;
    w.into_string()
}

fn write_concepto(w: &mut XmlWriter, item: &LineItem) -> Result<(), XmlError> {
    let attrs = Attrs::new()
        .req("ClaveProdServ", item.clave_prod_serv.as_str())
        .opt("NoIdentificacion", item.no_identificacion.as_deref())
        .req("Cantidad", format_decimal(item.cantidad))
        .req("ClaveUnidad", item.clave_unidad.as_str())
        .opt("Unidad", item.unidad.as_deref())
        .req("Descripcion", item.descripcion.as_str())
        .req("ValorUnitario", format_decimal(item.valor_unitario))
        .req("Importe", format_decimal(item.importe))
        .opt("Descuento", item.descuento.map(format_decimal))
        .req("ObjetoImp", item.objeto_imp.as_str());

    match item.transfer() {
        Some(traslado) => {
            w.start_element("cfdi:Concepto", &attrs)?;
            w.start_element("cfdi:Impuestos", &Attrs::new())?;
            write_traslados(w, std::slice::from_ref(&traslado))?;
            w.end_element("cfdi:Impuestos")?;
            w.end_element("cfdi:Concepto")?;
        }
        None => {
            w.empty_element("cfdi:Concepto", &attrs)?;
        }
    }
    Ok(())
}

fn write_traslados(w: &mut XmlWriter, traslados: &[TaxLine]) -> Result<(), XmlError> {
    w.start_element("cfdi:Traslados", &Attrs::new())?;
    for t in traslados {
        w.empty_element(
            "cfdi:Traslado",
            &Attrs::new()
                .req("Base", format_decimal(t.base))
                .req("Impuesto", t.impuesto.as_str())
                .req("TipoFactor", t.tipo_factor.code())
                .opt("TasaOCuota", t.tasa_o_cuota.map(format_rate))
                .opt("Importe", t.importe.map(format_decimal)),
        )?;
    }
    w.end_element("cfdi:Traslados")?;
    Ok(())
}
