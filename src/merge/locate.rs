use crate::catalog::SchemaCatalog;
use crate::error::Result;
use crate::store::RowStore;
use crate::types::{EntityId, ReferenceColumn};
use std::collections::BTreeSet;
use tracing::debug;

/// Reference columns of the catalog that currently hold `id`.
///
/// Issues one count per reference column, honouring compound-key
/// discriminators. Always reads fresh; callers must not reuse the result
/// across merge attempts.
pub async fn locate(
    store: &dyn RowStore,
    catalog: &SchemaCatalog,
    id: EntityId,
) -> Result<BTreeSet<ReferenceColumn>> {
    let mut found = BTreeSet::new();
    for reference in catalog.reference_columns() {
        let n = store.count(&reference.table, &reference.filter(id)).await?;
        if n > 0 {
            debug!(%reference, rows = n, %id, "reference located");
            found.insert(reference.clone());
        }
    }
    Ok(found)
}
