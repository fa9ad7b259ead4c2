use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::search::Hits;

/// Location attribute counted over a result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocationDimension {
    Borough,
    Street,
    Zip,
}

impl LocationDimension {
    pub const ALL: [LocationDimension; 3] = [Self::Borough, Self::Street, Self::Zip];

    /// Metadata key the dimension is read from.
    pub fn metadata_key(self) -> &'static str {
        match self {
            Self::Borough => "borough",
            Self::Street => "street_name",
            Self::Zip => "incident_zip",
        }
    }
}

impl fmt::Display for LocationDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Borough => "borough",
            Self::Street => "street",
            Self::Zip => "zip",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Per-dimension category counts over a result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSummary {
    /// Number of results summarized, with or without location data.
    pub total: usize,
    /// count descending, then category ascending; at most `top_n` each
    pub tables: BTreeMap<LocationDimension, Vec<CategoryCount>>,
}

impl LocationSummary {
    pub fn table(&self, dimension: LocationDimension) -> &[CategoryCount] {
        self.tables.get(&dimension).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Count borough, street and zip values across `hits`.
///
/// Results missing a dimension simply do not count towards it.
pub fn summarize_locations(hits: &Hits, top_n: usize) -> LocationSummary {
    let mut counts: BTreeMap<(LocationDimension, &str), usize> = BTreeMap::new();
    for hit in hits {
        for dimension in LocationDimension::ALL {
            if let Some(value) = hit.field(dimension.metadata_key()) {
                *counts.entry((dimension, value)).or_default() += 1;
            }
        }
    }

    let mut tables: BTreeMap<LocationDimension, Vec<CategoryCount>> =
        LocationDimension::ALL.iter().map(|d| (*d, Vec::new())).collect();
    for ((dimension, category), count) in counts {
        if let Some(table) = tables.get_mut(&dimension) {
            table.push(CategoryCount {
                category: category.to_string(),
                count,
            });
        }
    }
    for table in tables.values_mut() {
        table.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        table.truncate(top_n);
    }

    LocationSummary {
        total: hits.len(),
        tables,
    }
}

impl fmt::Display for LocationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Locations across {} results:", self.total)?;
        for (dimension, table) in &self.tables {
            writeln!(f, "  {dimension}:")?;
            for entry in table {
                writeln!(f, "    {} ({})", entry.category, entry.count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::HitEntry;

    fn hit(borough: &str, street: &str) -> HitEntry {
        let mut fields = BTreeMap::new();
        if !borough.is_empty() {
            fields.insert("borough".to_string(), borough.to_string());
        }
        if !street.is_empty() {
            fields.insert("street_name".to_string(), street.to_string());
        }
        HitEntry {
            index: 0,
            document_id: String::new(),
            score: 0.0,
            text: String::new(),
            fields,
        }
    }

    #[test]
    fn sorts_by_count_then_category_and_truncates() {
        let hits = Hits::new(vec![
            hit("QUEENS", "MAIN ST"),
            hit("BRONX", "ELM ST"),
            hit("QUEENS", "ELM ST"),
            hit("BROOKLYN", ""),
            hit("", "OAK AVE"),
        ]);
        let summary = summarize_locations(&hits, 2);
        assert_eq!(summary.total, 5);

        let boroughs: Vec<(&str, usize)> = summary
            .table(LocationDimension::Borough)
            .iter()
            .map(|c| (c.category.as_str(), c.count))
            .collect();
        assert_eq!(boroughs, vec![("QUEENS", 2), ("BRONX", 1)]);

        let streets: Vec<&str> = summary
            .table(LocationDimension::Street)
            .iter()
            .map(|c| c.category.as_str())
            .collect();
        assert_eq!(streets, vec!["ELM ST", "MAIN ST"]);
        assert!(summary.table(LocationDimension::Zip).is_empty());
    }

    #[test]
    fn empty_results_give_empty_tables() {
        let summary = summarize_locations(&Hits::default(), 10);
        assert_eq!(summary.total, 0);
        assert!(LocationDimension::ALL.iter().all(|d| summary.table(*d).is_empty()));
    }
}
