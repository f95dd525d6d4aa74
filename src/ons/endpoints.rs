use once_cell::sync::Lazy;

use crate::series::SeriesTag;

/// ONS endpoint identifier, e.g. "Geracao_SIN_Eolica_json"
pub type EndpointId = &'static str;

/// Grouping key shared by all series drawn on one chart
pub type GroupingKey = &'static str;

/// Represents one selectable ONS "energia agora" endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: EndpointId,
    pub category: &'static str,
    pub name: &'static str,
    pub grouping: GroupingKey,
    pub tag: SeriesTag,
}

impl Endpoint {
    pub const fn new(
        id: EndpointId,
        category: &'static str,
        name: &'static str,
        grouping: GroupingKey,
        tag: SeriesTag,
    ) -> Self {
        Self {
            id,
            category,
            name,
            grouping,
            tag,
        }
    }
}

/// All known ONS endpoints
pub static ENDPOINTS: Lazy<Vec<Endpoint>> = Lazy::new(|| {
    use SeriesTag::*;
    vec![
        Endpoint::new("Geracao_SIN_Hidraulica_json", "Geração", "Hidráulica", "SIN", Hydro),
        Endpoint::new("Geracao_SIN_Termica_json", "Geração", "Térmica", "SIN", Thermal),
        Endpoint::new("Geracao_SIN_Eolica_json", "Geração", "Eólica", "SIN", Wind),
        Endpoint::new("Geracao_SIN_Solar_json", "Geração", "Solar", "SIN", Solar),
        Endpoint::new("Geracao_SIN_Nuclear_json", "Geração", "Nuclear", "SIN", Nuclear),
        Endpoint::new("Geracao_SIN_Total_json", "Geração", "Total", "SIN", Total),
        Endpoint::new("Carga_SIN_Total_json", "Carga", "Carga Total", "SIN", Load),
        Endpoint::new("Carga_Regioes_json", "Carga", "Carga por Região", "Regioes", Load),
        Endpoint::new(
            "Intercambio_Regioes_json",
            "Intercâmbio",
            "Entre Regiões",
            "Regioes",
            Interchange,
        ),
        Endpoint::new(
            "Energia_Armazenada_json",
            "Reservatórios",
            "Energia Armazenada",
            "Reservatorios",
            StoredEnergy,
        ),
        Endpoint::new(
            "Volume_Util_json",
            "Reservatórios",
            "Volume Útil",
            "Reservatorios",
            UsefulVolume,
        ),
    ]
});

/// Get a catalog endpoint by its identifier
pub fn get_endpoint(id: &str) -> Option<&'static Endpoint> {
    ENDPOINTS.iter().find(|e| e.id == id)
}

/// Endpoints grouped by category, categories in catalog order
pub fn by_category() -> Vec<(&'static str, Vec<&'static Endpoint>)> {
    let mut categories: Vec<(&'static str, Vec<&'static Endpoint>)> = Vec::new();
    for endpoint in ENDPOINTS.iter() {
        match categories.iter_mut().find(|(c, _)| *c == endpoint.category) {
            Some((_, list)) => list.push(endpoint),
            None => categories.push((endpoint.category, vec![endpoint])),
        }
    }
    categories
}

/// Substring rules for identifiers outside the catalog, first match wins
const TAG_RULES: &[(&str, SeriesTag)] = &[
    ("Hidraulica", SeriesTag::Hydro),
    ("Termica", SeriesTag::Thermal),
    ("Eolica", SeriesTag::Wind),
    ("Solar", SeriesTag::Solar),
    ("Nuclear", SeriesTag::Nuclear),
    ("Carga", SeriesTag::Load),
    ("Intercambio", SeriesTag::Interchange),
    ("Armazenada", SeriesTag::StoredEnergy),
    ("Volume", SeriesTag::UsefulVolume),
    ("Geracao", SeriesTag::Total),
];

/// Derive tag and grouping for an endpoint identifier.
///
/// Catalog entries answer directly; other identifiers of the
/// `<Family>_<Subsystem>_<Source>_json` shape are classified by substring,
/// with the subsystem segment as grouping.
pub fn classify(id: &str) -> Option<(String, SeriesTag)> {
    if let Some(endpoint) = get_endpoint(id) {
        return Some((endpoint.grouping.to_string(), endpoint.tag));
    }

    let tag = TAG_RULES
        .iter()
        .find(|(needle, _)| id.contains(needle))
        .map(|(_, tag)| *tag)?;

    let segments: Vec<&str> = id.trim_end_matches("_json").split('_').collect();
    let grouping = match segments.as_slice() {
        [_, subsystem, _, ..] => subsystem.to_string(),
        _ => return None,
    };

    Some((grouping, tag))
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} ({})", self.category, self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let wind = get_endpoint("Geracao_SIN_Eolica_json").unwrap();
        assert_eq!(wind.tag, SeriesTag::Wind);
        assert_eq!(wind.grouping, "SIN");
        assert!(get_endpoint("Nope_json").is_none());
        assert_eq!(get_endpoint("Geracao_SIN_Total_json").unwrap().tag, SeriesTag::Total);
    }

    #[test]
    fn test_by_category_keeps_order() {
        let categories: Vec<_> = by_category().into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            categories,
            vec!["Geração", "Carga", "Intercâmbio", "Reservatórios"]
        );
        assert_eq!(by_category()[0].1.len(), 6);
    }

    #[test]
    fn test_classify_outside_catalog() {
        assert_eq!(
            classify("Geracao_Nordeste_Eolica_json"),
            Some(("Nordeste".to_string(), SeriesTag::Wind))
        );
        assert_eq!(
            classify("Carga_Sul_Total_json"),
            Some(("Sul".to_string(), SeriesTag::Load))
        );
        assert_eq!(
            classify("Geracao_Norte_Total_json"),
            Some(("Norte".to_string(), SeriesTag::Total))
        );
        assert_eq!(classify("Precos_json"), None);
        assert_eq!(classify("Solar"), None);
    }

    #[test]
    fn test_classify_catalog_entry() {
        assert_eq!(
            classify("Volume_Util_json"),
            Some(("Reservatorios".to_string(), SeriesTag::UsefulVolume))
        );
    }
}
