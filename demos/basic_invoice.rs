//! Build a CFDI 4.0 invoice, check its codes against the SAT catalogs, attach
//! a Carta Porte and seal it.
//!
//! Sealing needs a CSD; point `CFDI_CER`, `CFDI_KEY` and `CFDI_KEY_PASSWORD`
//! at one to get a sealed document, otherwise the unsealed XML is printed.

use chrono::NaiveDate;
use cfdi::Factura;
use cfdi::cartaporte::{CartaPorte, CartaPorteAttributes, Location};
use cfdi::catalogos::Catalogs;
use cfdi::config::Config;
use cfdi::core::*;
use rust_decimal_macros::dec;

fn main() -> Result<(), CfdiError> {
    let mut factura = Factura::new(Config::from_env());
    factura
        .builder_mut()
        .set_issuer("EKU9003173C9", "ESCUELA KEMPER URGATE", "601")
        .set_recipient("URE180429TM6", "UNIVERSIDAD ROBOTICA ESPAÑOLA", "601", "86991", "G03")
        .set_line_items(vec![
            LineItemBuilder::new("78101800", dec!(1), "E48", "Flete Queretaro - CDMX", dec!(8500))
                .unidad("Servicio")
                .traslado("002", TipoFactor::Tasa, dec!(0.16))
                .build(),
            LineItemBuilder::new("78141500", dec!(2), "E48", "Maniobras de carga", dec!(450))
                .descuento(dec!(90))
                .traslado("002", TipoFactor::Tasa, dec!(0.16))
                .build(),
        ]);

    let totals = Totals::from_line_items(factura.builder().line_items());
    let fecha = NaiveDate::from_ymd_opt(2024, 6, 15)
        .and_then(|d| d.and_hms_opt(10, 30, 0))
        .unwrap_or_default();
    let attrs = InvoiceAttributes::new(fecha, "76000")
        .serie("CP")
        .folio("1024")
        .forma_pago("03")
        .metodo_pago("PUE")
        .totals(&totals);

    println!("SubTotal:  {} MXN", totals.sub_total);
    println!("Descuento: {} MXN", totals.descuento.unwrap_or_default());
    println!("IVA:       {} MXN", totals.impuestos_trasladados);
    println!("Total:     {} MXN", totals.total);
    println!("---");

    let catalogs = Catalogs::new(factura.config().catalog_dir());
    for (value, name) in [("03", "FormaPago"), ("PUE", "MetodoPago"), ("G03", "UsoCfdi")] {
        let found = catalogs.find_in_catalog(value, "clave", name)?;
        let label = found
            .data
            .as_ref()
            .and_then(|d| d.get("descripcion"))
            .and_then(|d| d.as_str())
            .unwrap_or("?");
        println!("{name:<10} {value:<4} {label}");
    }
    println!("---");

    let cer = std::env::var("CFDI_CER").ok();
    let key = std::env::var("CFDI_KEY").ok();
    if let (Some(cer), Some(key)) = (&cer, &key) {
        let password = std::env::var("CFDI_KEY_PASSWORD").unwrap_or_default();
        factura.load_certificate(cer)?;
        factura.load_private_key(key, &password)?;
    }

    let mut carta_porte = CartaPorte::new(factura.generate_xml(&attrs)?);
    carta_porte
        .set_origin(Location {
            id_ubicacion: Some("OR000001".into()),
            rfc_remitente_destinatario: Some("EKU9003173C9".into()),
            fecha_hora_salida_llegada: Some(fecha),
            estado: Some("QUE".into()),
            pais: Some("MEX".into()),
            codigo_postal: Some("76000".into()),
            ..Location::default()
        })
        .set_destination(Location {
            id_ubicacion: Some("DE000001".into()),
            rfc_remitente_destinatario: Some("URE180429TM6".into()),
            fecha_hora_salida_llegada: Some(fecha),
            distancia_recorrida: Some(dec!(215)),
            estado: Some("CMX".into()),
            pais: Some("MEX".into()),
            codigo_postal: Some("06000".into()),
            ..Location::default()
        });
    let document = carta_porte.attach(&CartaPorteAttributes {
        transp_internac: Some(false),
        total_dist_rec: Some(dec!(215)),
        ..CartaPorteAttributes::default()
    })?;

    if factura.has_private_key() {
        let sealed = factura.seal_xml(&document)?;
        println!("Cadena original: {}", sealed.cadena_original());
        println!("Sello:           {}", sealed.sello());
        println!("{}", sealed.xml());
    } else {
        println!("{document}");
    }
    Ok(())
}
