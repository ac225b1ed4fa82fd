#![cfg(feature = "all")]

mod common;

use cfdi::Factura;
use cfdi::cartaporte::{CartaPorte, CartaPorteAttributes, Location};
use cfdi::core::*;
use cfdi::sello::{Certificate, PrivateKey};
use cfdi::xml::{ns, tree};
use common::*;
use rust_decimal_macros::dec;

fn factura() -> Factura {
    let mut factura = Factura::new(config());
    factura.set_certificate(Certificate::from_der(&csd().certificate).unwrap());
    factura.set_private_key(PrivateKey::from_encrypted_der(&csd().key, PASSPHRASE).unwrap());
    fill_builder(factura.builder_mut());
    factura
}

fn unsealed_invoice() -> String {
    let factura = factura();
    factura.generate_xml(&attributes(factura.builder())).unwrap()
}

fn origin() -> Location {
    Location {
        id_ubicacion: Some("OR000001".into()),
        rfc_remitente_destinatario: Some("AAA010101AAA".into()),
        fecha_hora_salida_llegada: Some(fecha()),
        estado: Some("QUE".into()),
        pais: Some("MEX".into()),
        codigo_postal: Some("76000".into()),
        ..Location::default()
    }
}

fn destination() -> Location {
    Location {
        id_ubicacion: Some("DE000001".into()),
        rfc_remitente_destinatario: Some("XAXX010101000".into()),
        fecha_hora_salida_llegada: Some(fecha()),
        distancia_recorrida: Some(dec!(215.5)),
        calle: Some("Av. Juarez".into()),
        estado: Some("CMX".into()),
        pais: Some("MEX".into()),
        codigo_postal: Some("06000".into()),
        ..Location::default()
    }
}

fn carta_porte(document: &str) -> CartaPorte {
    let mut cp = CartaPorte::new(document);
    cp.set_origin(origin()).set_destination(destination());
    cp
}

fn find<'a>(el: &'a tree::Element, local: &str) -> Option<&'a tree::Element> {
    if el.local_name() == local {
        return Some(el);
    }
    el.child_elements().find_map(|child| find(child, local))
}

fn attribute_names(el: &tree::Element) -> Vec<&str> {
    el.attributes().iter().map(|(k, _)| k.as_str()).collect()
}

#[test]
fn empty_document_is_refused() {
    for document in ["", "  ", "\n\t"] {
        let cp = CartaPorte::new(document);
        let err = cp.attach(&CartaPorteAttributes::default()).unwrap_err();
        assert!(matches!(err, ComplementError::MissingDocument), "{document:?}");
        assert!(err.is_recoverable());
        assert_eq!(cp.document(), document);
    }
}

#[test]
fn stamped_document_is_refused() {
    let stamped = format!(
        r#"<cfdi:Comprobante xmlns:cfdi="{}" Version="4.0"><cfdi:Complemento><tfd:TimbreFiscalDigital xmlns:tfd="{}" UUID="X"/></cfdi:Complemento></cfdi:Comprobante>"#,
        ns::CFDI,
        ns::TFD
    );
    let cp = carta_porte(&stamped);
    let err = cp.attach(&CartaPorteAttributes::default()).unwrap_err();
    assert!(matches!(err, ComplementError::AlreadyStamped));
    assert_eq!(cp.document(), stamped);
    assert!(err.is_recoverable());
    assert_eq!(err.to_string(), "this XML has already been stamped");
}

#[test]
fn foreign_root_is_refused() {
    let err = carta_porte("<Invoice/>")
        .attach(&CartaPorteAttributes::default())
        .unwrap_err();
    assert!(matches!(err, ComplementError::NotAnInvoice));
    assert!(!err.is_recoverable());
}

#[test]
fn domestic_transport_header() {
    let attrs = CartaPorteAttributes {
        transp_internac: Some(false),
        total_dist_rec: Some(dec!(215.5)),
        ..CartaPorteAttributes::default()
    };
    let mut cp = carta_porte(&unsealed_invoice());
    cp.set_customs_regimes(vec!["IMD".into()]);
    let xml = cp.attach(&attrs).unwrap();

    let root = tree::parse(&xml).unwrap();
    assert_eq!(root.attribute("xmlns:cartaporte31"), Some(ns::CARTA_PORTE_31));
    let header = find(&root, "CartaPorte").unwrap();
    assert!(header.is(ns::CARTA_PORTE_31, "CartaPorte"));
    assert_eq!(
        attribute_names(header),
        ["Version", "IdCCP", "TranspInternac", "TotalDistRec"]
    );
    assert_eq!(header.attribute("Version"), Some("3.1"));
    assert_eq!(header.attribute("TranspInternac"), Some("No"));
    assert_eq!(header.attribute("TotalDistRec"), Some("215.50"));
    assert!(header.attribute("IdCCP").unwrap().starts_with("CCC"));
    // Regimes are for international transport only.
    assert!(find(&root, "RegimenesAduaneros").is_none());
}

#[test]
fn international_transport_lists_regimes() {
    let attrs = CartaPorteAttributes {
        transp_internac: Some(true),
        entrada_salida_merc: Some("Entrada".into()),
        pais_origen_destino: Some("USA".into()),
        via_entrada_salida: Some("01".into()),
        ..CartaPorteAttributes::default()
    };
    let mut cp = carta_porte(&unsealed_invoice());
    cp.set_customs_regimes(vec!["IMD".into(), " ".into(), "EXD".into()]);
    let xml = cp.attach(&attrs).unwrap();

    let root = tree::parse(&xml).unwrap();
    let header = find(&root, "CartaPorte").unwrap();
    assert_eq!(
        attribute_names(header),
        [
            "Version",
            "IdCCP",
            "EntradaSalidaMerc",
            "TranspInternac",
            "PaisOrigenDestino",
            "ViaEntradaSalida"
        ]
    );
    assert_eq!(header.attribute("TranspInternac"), Some("Sí"));
    let codes: Vec<_> = find(&root, "RegimenesAduaneros")
        .unwrap()
        .child_elements()
        .filter_map(|el| el.attribute("RegimenAduanero"))
        .collect();
    assert_eq!(codes, ["IMD", "EXD"]);
}

#[test]
fn isthmus_poles_follow_the_registry_flag() {
    let mut attrs = CartaPorteAttributes {
        transp_internac: Some(false),
        registro_istmo: Some(true),
        ubicacion_polo_origen: Some("01".into()),
        ubicacion_polo_destino: Some("02".into()),
        ..CartaPorteAttributes::default()
    };
    let document = unsealed_invoice();

    let xml = carta_porte(&document).attach(&attrs).unwrap();
    let root = tree::parse(&xml).unwrap();
    let header = find(&root, "CartaPorte").unwrap();
    assert_eq!(header.attribute("RegistroISTMO"), Some("Sí"));
    assert_eq!(header.attribute("UbicacionPoloOrigen"), Some("01"));
    assert_eq!(header.attribute("UbicacionPoloDestino"), Some("02"));

    attrs.registro_istmo = Some(false);
    let xml = carta_porte(&document).attach(&attrs).unwrap();
    let root = tree::parse(&xml).unwrap();
    let header = find(&root, "CartaPorte").unwrap();
    assert_eq!(header.attribute("RegistroISTMO"), Some("No"));
    assert_eq!(header.attribute("UbicacionPoloOrigen"), None);
    assert_eq!(header.attribute("UbicacionPoloDestino"), None);
}

#[test]
fn locations_are_written_origin_first() {
    let xml = carta_porte(&unsealed_invoice())
        .attach(&CartaPorteAttributes {
            transp_internac: Some(false),
            ..CartaPorteAttributes::default()
        })
        .unwrap();
    let root = tree::parse(&xml).unwrap();
    let ubicaciones: Vec<_> = find(&root, "Ubicaciones").unwrap().child_elements().collect();
    assert_eq!(ubicaciones.len(), 2);

    let (origen, destino) = (ubicaciones[0], ubicaciones[1]);
    assert_eq!(origen.attribute("TipoUbicacion"), Some("Origen"));
    assert_eq!(origen.attribute("FechaHoraSalidaLlegada"), Some("2024-06-15T12:00:00"));
    assert_eq!(destino.attribute("TipoUbicacion"), Some("Destino"));
    assert_eq!(destino.attribute("DistanciaRecorrida"), Some("215.50"));

    let domicilio = destino.child_elements().next().unwrap();
    assert_eq!(
        attribute_names(domicilio),
        ["Calle", "Estado", "Pais", "CodigoPostal"]
    );
}

#[test]
fn existing_complemento_is_reused() {
    let invoice = unsealed_invoice();
    let attrs = CartaPorteAttributes {
        transp_internac: Some(false),
        ..CartaPorteAttributes::default()
    };
    let once = carta_porte(&invoice).attach(&attrs).unwrap();
    let twice = carta_porte(&once).attach(&attrs).unwrap();

    let root = tree::parse(&twice).unwrap();
    let complementos: Vec<_> = root
        .child_elements()
        .filter(|el| el.is(ns::CFDI, "Complemento"))
        .collect();
    assert_eq!(complementos.len(), 1);
    assert_eq!(complementos[0].child_elements().count(), 2);
    assert_eq!(twice.matches("xmlns:cartaporte31=").count(), 1);
}

#[test]
fn complement_is_part_of_the_seal() {
    let factura = factura();
    let attrs = CartaPorteAttributes {
        transp_internac: Some(false),
        total_dist_rec: Some(dec!(215.5)),
        ..CartaPorteAttributes::default()
    };
    let document = carta_porte(&unsealed_invoice()).attach(&attrs).unwrap();
    let sealed = factura.seal_xml(&document).unwrap();

    let cadena = sealed.cadena_original();
    let base = REFERENCE_CADENA.trim_end_matches("||");
    assert!(cadena.starts_with(base), "{cadena}");
    assert!(cadena.contains("|16.00|3.1|CCC"), "{cadena}");
    assert!(cadena.contains("|No|215.50|Origen|OR000001|AAA010101AAA|2024-06-15T12:00:00|QUE|MEX|76000"));
    assert!(cadena.contains("|Destino|DE000001|XAXX010101000|2024-06-15T12:00:00|215.50|Av. Juarez|CMX|MEX|06000||"));

    let public_key = factura.certificate().unwrap().public_key().unwrap();
    cfdi::sello::verify(&public_key, cadena, sealed.sello()).unwrap();
}

#[test]
fn sealed_document_is_still_accepted() {
    let factura = factura();
    let sealed = factura
        .generate_sealed_xml(&attributes(factura.builder()))
        .unwrap();
    let xml = carta_porte(sealed.xml())
        .attach(&CartaPorteAttributes::default())
        .unwrap();
    assert!(xml.contains("cartaporte31:CartaPorte"));
}
