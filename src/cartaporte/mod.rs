//! Carta Porte 3.1 complement.
//!
//! The complement is attached to an unsealed, unstamped CFDI and the result
//! is sealed afterwards (see [`crate::Factura::seal_xml`]). Only the
//! `CartaPorte` header, customs regimes and the origin/destination
//! `Ubicaciones` are produced.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::ComplementError;
use crate::xml::tree::{self, Element, Node};
use crate::xml::{CARTA_PORTE_31_SCHEMA_LOCATION, FECHA_FORMAT, format_decimal, ns};

pub const CARTA_PORTE_VERSION: &str = "3.1";
const PREFIX: &str = "cartaporte31";

/// Attributes of the `CartaPorte` element.
///
/// `None` leaves an attribute out; `transp_internac` and `registro_istmo`
/// render as `Sí` / `No` when set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartaPorteAttributes {
    pub transp_internac: Option<bool>,
    pub entrada_salida_merc: Option<String>,
    pub pais_origen_destino: Option<String>,
    pub via_entrada_salida: Option<String>,
    pub total_dist_rec: Option<Decimal>,
    pub registro_istmo: Option<bool>,
    /// Only written when `registro_istmo` is `Some(true)`.
    pub ubicacion_polo_origen: Option<String>,
    /// Only written when `registro_istmo` is `Some(true)`.
    pub ubicacion_polo_destino: Option<String>,
}

/// An origin or destination `Ubicacion`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id_ubicacion: Option<String>,
    pub rfc_remitente_destinatario: Option<String>,
    pub nombre_remitente_destinatario: Option<String>,
    pub fecha_hora_salida_llegada: Option<NaiveDateTime>,
    pub num_reg_id_trib: Option<String>,
    pub residencia_fiscal: Option<String>,
    /// Destination only; ignored for the origin.
    pub distancia_recorrida: Option<Decimal>,
    pub calle: Option<String>,
    pub numero_exterior: Option<String>,
    pub numero_interior: Option<String>,
    pub colonia: Option<String>,
    pub localidad: Option<String>,
    pub referencia: Option<String>,
    pub municipio: Option<String>,
    pub estado: Option<String>,
    pub pais: Option<String>,
    pub codigo_postal: Option<String>,
}

impl Location {
    fn site_fields(&self, destination: bool) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("IDUbicacion", self.id_ubicacion.clone()),
            ("RFCRemitenteDestinatario", self.rfc_remitente_destinatario.clone()),
            ("NombreRemitenteDestinatario", self.nombre_remitente_destinatario.clone()),
            (
                "FechaHoraSalidaLlegada",
                self.fecha_hora_salida_llegada
                    .map(|f| f.format(FECHA_FORMAT).to_string()),
            ),
            ("NumRegIdTrib", self.num_reg_id_trib.clone()),
            ("ResidenciaFiscal", self.residencia_fiscal.clone()),
            (
                "DistanciaRecorrida",
                self.distancia_recorrida
                    .filter(|_| destination)
                    .map(format_decimal),
            ),
        ]
    }

    fn address_fields(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("Calle", self.calle.as_deref()),
            ("NumeroExterior", self.numero_exterior.as_deref()),
            ("NumeroInterior", self.numero_interior.as_deref()),
            ("Colonia", self.colonia.as_deref()),
            ("Localidad", self.localidad.as_deref()),
            ("Referencia", self.referencia.as_deref()),
            ("Municipio", self.municipio.as_deref()),
            ("Estado", self.estado.as_deref()),
            ("Pais", self.pais.as_deref()),
            ("CodigoPostal", self.codigo_postal.as_deref()),
        ]
    }
}

/// Builds the complement for one document.
#[derive(Debug, Clone, Default)]
pub struct CartaPorte {
    document: String,
    customs_regimes: Vec<String>,
    origin: Location,
    destination: Location,
}

impl CartaPorte {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ..Self::default()
        }
    }

    /// The document the complement is attached to, as given to [`CartaPorte::new`].
    pub fn document(&self) -> &str {
        &self.document
    }

    /// `RegimenAduanero` codes, written only for international transport.
    pub fn set_customs_regimes(&mut self, codes: Vec<String>) -> &mut Self {
        self.customs_regimes = codes;
        self
    }

    pub fn set_origin(&mut self, origin: Location) -> &mut Self {
        self.origin = origin;
        self
    }

    pub fn set_destination(&mut self, destination: Location) -> &mut Self {
        self.destination = destination;
        self
    }

    /// Return the document with the complement inside `cfdi:Complemento`.
    ///
    /// A stamped document (one carrying a `tfd:TimbreFiscalDigital`) or an
    /// empty one is refused and left untouched.
    pub fn attach(&self, attributes: &CartaPorteAttributes) -> Result<String, ComplementError> {
        if self.document.trim().is_empty() {
            return Err(ComplementError::MissingDocument);
        }
        let root = tree::parse(&self.document)?;
        if root.any(&is_stamp) {
            return Err(ComplementError::AlreadyStamped);
        }
        if !root.is(ns::CFDI, "Comprobante") {
            return Err(ComplementError::NotAnInvoice);
        }
        if root.attribute("Sello").is_some() {
            warn!("attaching Carta Porte to a sealed document; the seal is no longer valid");
        }

        let id_ccp = generate_id_ccp();
        debug!(id_ccp = %id_ccp, version = CARTA_PORTE_VERSION, "attaching Carta Porte");
        let complement = self.carta_porte(attributes, &id_ccp);
        let root = with_complement(declare_namespace(root), complement);
        Ok(root.to_xml()?)
    }

    fn carta_porte(&self, attributes: &CartaPorteAttributes, id_ccp: &str) -> Element {
        let istmo = attributes.registro_istmo == Some(true);
        let mut cp = element("CartaPorte")
            .with_attribute("Version", CARTA_PORTE_VERSION)
            .with_attribute("IdCCP", id_ccp);
        cp = set(cp, "EntradaSalidaMerc", attributes.entrada_salida_merc.as_deref());
        cp = set(cp, "TranspInternac", attributes.transp_internac.map(si_no));
        cp = set(cp, "PaisOrigenDestino", attributes.pais_origen_destino.as_deref());
        cp = set(cp, "ViaEntradaSalida", attributes.via_entrada_salida.as_deref());
        cp = set(
            cp,
            "TotalDistRec",
            attributes.total_dist_rec.map(format_decimal).as_deref(),
        );
        cp = set(cp, "RegistroISTMO", attributes.registro_istmo.map(si_no));
        if istmo {
            cp = set(cp, "UbicacionPoloOrigen", attributes.ubicacion_polo_origen.as_deref());
            cp = set(cp, "UbicacionPoloDestino", attributes.ubicacion_polo_destino.as_deref());
        }

        if attributes.transp_internac == Some(true) {
            let regimes: Vec<&str> = self
                .customs_regimes
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            if !regimes.is_empty() {
                let mut list = element("RegimenesAduaneros");
                for code in regimes {
                    list = list.with_child(
                        element("RegimenAduaneroCCP").with_attribute("RegimenAduanero", code),
                    );
                }
                cp = cp.with_child(list);
            }
        }

        cp.with_child(
            element("Ubicaciones")
                .with_child(ubicacion("Origen", &self.origin, false))
                .with_child(ubicacion("Destino", &self.destination, true)),
        )
    }
}

/// `IdCCP`: "CCC" followed by a v4 UUID without its first three characters.
pub fn generate_id_ccp() -> String {
    let uuid = Uuid::new_v4().hyphenated().to_string();
    format!("CCC{}", uuid.get(3..).unwrap_or_default())
}

fn is_stamp(el: &Element) -> bool {
    el.is(ns::TFD, "TimbreFiscalDigital") || el.name() == "tfd:TimbreFiscalDigital"
}

fn si_no(flag: bool) -> &'static str {
    if flag { "Sí" } else { "No" }
}

fn element(local: &str) -> Element {
    Element::new(format!("{PREFIX}:{local}"), Some(ns::CARTA_PORTE_31))
}

fn set(el: Element, name: &str, value: Option<&str>) -> Element {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => el.with_attribute(name, v),
        None => el,
    }
}

fn ubicacion(tipo: &str, location: &Location, destination: bool) -> Element {
    let mut el = element("Ubicacion").with_attribute("TipoUbicacion", tipo);
    for (name, value) in location.site_fields(destination) {
        el = set(el, name, value.as_deref());
    }
    let mut domicilio = element("Domicilio");
    for (name, value) in location.address_fields() {
        domicilio = set(domicilio, name, value);
    }
    if domicilio.attributes().is_empty() {
        el
    } else {
        el.with_child(domicilio)
    }
}

fn declare_namespace(root: Element) -> Element {
    let anchor = if root.attribute("xmlns:xsi").is_some() {
        "xmlns:xsi"
    } else {
        "xmlns:cfdi"
    };
    let root =
        root.with_attribute_after(&format!("xmlns:{PREFIX}"), ns::CARTA_PORTE_31, Some(anchor));
    match root.attribute("xsi:schemaLocation") {
        Some(location) if !location.contains(ns::CARTA_PORTE_31) => {
            let location = format!("{location} {CARTA_PORTE_31_SCHEMA_LOCATION}");
            root.with_attribute("xsi:schemaLocation", location)
        }
        _ => root,
    }
}

/// Put `complement` into the existing `Complemento`, or into a new one placed
/// before any `Addenda`.
fn with_complement(root: Element, complement: Element) -> Element {
    let complemento_name = match root.prefix() {
        Some(prefix) => format!("{prefix}:Complemento"),
        None => "Complemento".to_string(),
    };
    let (root, children) = root.into_parts();
    let mut children: Vec<Node> = children;
    let existing = children
        .iter()
        .position(|n| matches!(n, Node::Element(e) if e.is(ns::CFDI, "Complemento")));

    match existing {
        Some(i) => {
            if let Node::Element(complemento) = children.remove(i) {
                children.insert(i, Node::Element(complemento.with_child(complement)));
            }
        }
        None => {
            let complemento = Element::new(complemento_name, Some(ns::CFDI)).with_child(complement);
            let addenda = children
                .iter()
                .position(|n| matches!(n, Node::Element(e) if e.is(ns::CFDI, "Addenda")));
            match addenda {
                Some(i) => children.insert(i, Node::Element(complemento)),
                None => children.push(Node::Element(complemento)),
            }
        }
    }
    root.with_children(children)
}
