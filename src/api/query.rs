use crate::config;
use crate::model::intent::Selector;

/// Row filter in the store's `column=op.value` query dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { field: String, value: String },
    /// Case-insensitive pattern, `*` is the wildcard.
    ILike { field: String, pattern: String },
    IsNull { field: String },
}

impl Filter {
    pub fn eq(field: &str, value: impl ToString) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn ilike(field: &str, pattern: &str) -> Self {
        Filter::ILike {
            field: field.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn is_null(field: &str) -> Self {
        Filter::IsNull {
            field: field.to_string(),
        }
    }

    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Eq { field, value } => (field.clone(), format!("eq.{}", value)),
            Filter::ILike { field, pattern } => (field.clone(), format!("ilike.{}", pattern)),
            Filter::IsNull { field } => (field.clone(), "is.null".to_string()),
        }
    }
}

/// What to read: table, projected columns, filters and a stable ordering for paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadQuery {
    pub table: String,
    pub select: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<String>,
}

impl ReadQuery {
    pub fn table(table: &str) -> Self {
        ReadQuery {
            table: table.to_string(),
            select: Vec::new(),
            filters: Vec::new(),
            order: Some(format!("{}.asc", config::FIELD_ID)),
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    fn base_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 4);
        if !self.select.is_empty() {
            params.push(("select".to_string(), self.select.join(",")));
        }
        params.extend(self.filters.iter().map(Filter::to_param));
        params
    }

    pub fn page_params(&self, offset: usize, limit: usize) -> Vec<(String, String)> {
        let mut params = self.base_params();
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        params.push(("offset".to_string(), offset.to_string()));
        params.push(("limit".to_string(), limit.to_string()));
        params
    }

    pub fn count_params(&self) -> Vec<(String, String)> {
        self.base_params()
    }

    pub fn describe(&self) -> String {
        let filters: Vec<String> = self
            .filters
            .iter()
            .map(|f| {
                let (k, v) = f.to_param();
                format!("{}={}", k, v)
            })
            .collect();
        if filters.is_empty() {
            self.table.clone()
        } else {
            format!("{} [{}]", self.table, filters.join(", "))
        }
    }
}

pub fn selector_param(selector: &Selector) -> (String, String) {
    let field = config::FIELD_ID.to_string();
    match selector {
        Selector::Id(id) => (field, format!("eq.{}", id)),
        Selector::AnyOf(ids) => {
            let joined: Vec<String> = ids.iter().map(ToString::to_string).collect();
            (field, format!("in.({})", joined.join(",")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn page_params_carry_select_filters_order_and_window() {
        let query = ReadQuery::table("products")
            .select(&["id", "name", "manufacturer"])
            .filter(Filter::eq("manufacturer", "UNIVERSAL"));
        assert_eq!(
            query.page_params(2000, 1000),
            vec![
                pair("select", "id,name,manufacturer"),
                pair("manufacturer", "eq.UNIVERSAL"),
                pair("order", "id.asc"),
                pair("offset", "2000"),
                pair("limit", "1000"),
            ]
        );
    }

    #[test]
    fn count_params_skip_paging() {
        let query = ReadQuery::table("products")
            .filter(Filter::ilike("title", "*двигатель*"))
            .filter(Filter::is_null("category"));
        assert_eq!(
            query.count_params(),
            vec![pair("title", "ilike.*двигатель*"), pair("category", "is.null")]
        );
    }

    #[test]
    fn selectors_render_eq_and_in() {
        assert_eq!(selector_param(&Selector::Id(5)), pair("id", "eq.5"));
        assert_eq!(
            selector_param(&Selector::AnyOf(vec![1, 2, 3])),
            pair("id", "in.(1,2,3)")
        );
    }
}
