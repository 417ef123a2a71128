//! Glue types shared between a host query engine and this driver.
//!
//! A host engine (an analytics/query engine embedding this driver as a
//! table scan source) describes its projected columns and primary key to
//! the filter encoder and rowid extractor through these types, rather than
//! either side depending on the other's internal row representation.

/// One projected column as the host engine names and numbers it.
///
/// `id` is the host engine's own column identifier (not the TDS column
/// index), used so pushed-down filters can reference columns by the id the
/// engine will ask for them with later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostColumn {
    /// Column name, as it appears in the source table.
    pub name: String,
    /// Host engine's column id for this column.
    pub id: i64,
}

impl HostColumn {
    /// Construct a host column.
    #[must_use]
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self { name: name.into(), id }
    }
}

/// The host engine's virtual "rowid" column id.
///
/// Sentinel chosen to be unreachable by any real column id the host engine
/// assigns (which are small non-negative integers); mirrors how DuckDB's
/// table functions reserve the top bit for virtual columns.
pub const ROWID_COLUMN_ID: i64 = 1 << 63;

/// Describes the primary key of the table being scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkInfo {
    /// Primary key column names, in declared key order.
    pub columns: Vec<String>,
}

impl PkInfo {
    /// Construct a primary key descriptor.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Whether the primary key spans more than one column.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// Whether the table has no declared primary key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// The projection and key metadata a host engine hands to the filter
/// encoder, value serializer, and rowid extractor for one table scan.
#[derive(Debug, Clone)]
pub struct HostEngineBridge {
    /// Columns projected by the host engine, in scan order.
    pub columns: Vec<HostColumn>,
    /// Primary key of the scanned table, if any.
    pub pk: Option<PkInfo>,
}

impl HostEngineBridge {
    /// Construct a bridge from the host engine's projected columns and
    /// (optional) primary key.
    #[must_use]
    pub fn new(columns: Vec<HostColumn>, pk: Option<PkInfo>) -> Self {
        Self { columns, pk }
    }

    /// Column names in projection order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Host engine column ids in projection order.
    #[must_use]
    pub fn column_ids(&self) -> Vec<i64> {
        self.columns.iter().map(|c| c.id).collect()
    }

    /// Look up a projected column's name by host engine id.
    #[must_use]
    pub fn column_name(&self, id: i64) -> Option<&str> {
        self.columns.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }

    /// Whether `id` refers to the virtual rowid column rather than a real one.
    #[must_use]
    pub fn is_rowid_column(id: i64) -> bool {
        id == ROWID_COLUMN_ID
    }

    /// The primary key, if the table has one.
    #[must_use]
    pub fn pk_info(&self) -> Option<&PkInfo> {
        self.pk.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn column_name_looks_up_by_id() {
        let bridge = HostEngineBridge::new(
            vec![HostColumn::new("id", 0), HostColumn::new("name", 1)],
            None,
        );
        assert_eq!(bridge.column_name(1), Some("name"));
        assert_eq!(bridge.column_name(99), None);
    }

    #[test]
    fn rowid_sentinel_is_recognized() {
        assert!(HostEngineBridge::is_rowid_column(ROWID_COLUMN_ID));
        assert!(!HostEngineBridge::is_rowid_column(0));
    }

    #[test]
    fn pk_composite_detection() {
        assert!(!PkInfo::new(vec!["id".into()]).is_composite());
        assert!(PkInfo::new(vec!["a".into(), "b".into()]).is_composite());
        assert!(PkInfo::new(vec![]).is_empty());
    }
}
