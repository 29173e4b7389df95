//! Diversified search query generation

use crate::config::DescriptorAxes;
use indexmap::IndexSet;

/// Expands a subject into search queries over the descriptor axes
///
/// Combinations are enumerated viewpoint-major, then lighting, then setting,
/// and collected into an insertion-ordered set so the output order is stable
/// across runs.
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    axes: DescriptorAxes,
    max_queries: usize,
}

impl QueryGenerator {
    #[must_use]
    pub fn new(axes: DescriptorAxes, max_queries: usize) -> Self {
        Self { axes, max_queries }
    }

    #[must_use]
    pub fn max_queries(&self) -> usize {
        self.max_queries
    }

    /// Generate at most `max_queries` distinct queries for `subject`
    #[must_use]
    pub fn generate(&self, subject: &str) -> Vec<String> {
        let mut queries = IndexSet::new();
        if self.max_queries == 0 {
            return Vec::new();
        }

        'outer: for viewpoint in &self.axes.viewpoints {
            for lighting in &self.axes.lighting {
                for setting in &self.axes.settings {
                    queries.insert(compose(&[subject, viewpoint, lighting, setting]));
                    if queries.len() >= self.max_queries {
                        break 'outer;
                    }
                }
            }
        }

        queries.into_iter().collect()
    }
}

/// Join the non-blank parts with single spaces
fn compose(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn axes(a: usize, b: usize, c: usize) -> DescriptorAxes {
        DescriptorAxes {
            viewpoints: (0..a).map(|i| format!("view{i}")).collect(),
            lighting: (0..b).map(|i| format!("light{i}")).collect(),
            settings: (0..c).map(|i| format!("place{i}")).collect(),
        }
    }

    #[test]
    fn test_all_combinations_when_budget_allows() {
        for max in [24, 25, 100] {
            let queries = QueryGenerator::new(axes(2, 3, 4), max).generate("Audi R8 2014");
            assert_eq!(queries.len(), 24);
            let distinct: HashSet<_> = queries.iter().collect();
            assert_eq!(distinct.len(), 24);
        }
    }

    #[test]
    fn test_budget_caps_query_count() {
        for max in [1, 5, 23] {
            let queries = QueryGenerator::new(axes(2, 3, 4), max).generate("Audi R8 2014");
            assert_eq!(queries.len(), max);
            let distinct: HashSet<_> = queries.iter().collect();
            assert_eq!(distinct.len(), max);
        }
    }

    #[test]
    fn test_nested_enumeration_order() {
        let queries = QueryGenerator::new(axes(2, 2, 2), 3).generate("F40");
        assert_eq!(
            queries,
            vec![
                "F40 view0 light0 place0",
                "F40 view0 light0 place1",
                "F40 view0 light1 place0",
            ]
        );
    }

    #[test]
    fn test_deterministic_output() {
        let generator = QueryGenerator::new(DescriptorAxes::default(), 10);
        assert_eq!(generator.generate("BMW X5 2015"), generator.generate("BMW X5 2015"));
    }

    #[test]
    fn test_duplicate_descriptors_collapse() {
        let axes = DescriptorAxes {
            viewpoints: vec!["front".into(), "front".into()],
            lighting: vec!["day".into()],
            settings: vec!["street".into(), " ".into()],
        };
        let queries = QueryGenerator::new(axes, 10).generate("F40");
        assert_eq!(queries, vec!["F40 front day street", "F40 front day"]);
    }

    #[test]
    fn test_zero_budget() {
        assert!(QueryGenerator::new(axes(1, 1, 1), 0).generate("F40").is_empty());
    }
}
