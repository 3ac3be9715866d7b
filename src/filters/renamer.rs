//! Entity class renamer.
//!
//! Rewrites the `name` column of the entity_class view. Classes missing from
//! the view are skipped silently.

use std::collections::BTreeMap;

use tracing::debug;

use crate::mapping::{DatabaseMapping, ViewSource};
use crate::planner::{Expr, Predicate, Subquery};
use crate::storage::{StorageBackend, Table};
use crate::{Error, Result};

use super::FilterConfig;

pub const ENTITY_CLASS_RENAMER_TYPE: &str = "entity_class_renamer";
pub const ENTITY_CLASS_RENAMER_SHORTHAND_TAG: &str = "entity_class_rename";

pub fn apply_renaming_to_entity_class_subquery<B: StorageBackend>(
    db_map: &mut DatabaseMapping<B>,
    name_map: &BTreeMap<String, String>,
) -> Result<()> {
    let original_entity_class_sq = db_map.subquery(Table::EntityClass);
    let mut renames = Vec::new();
    for row in &db_map.query(&original_entity_class_sq)?.rows {
        if let Some(new_name) = name_map.get(&row.get::<String>("name")?) {
            renames.push((row.id()?, new_name.clone()));
        }
    }
    if renames.is_empty() {
        debug!("entity class renamer matched nothing");
        return Ok(());
    }
    debug!(?renames, "installing entity class renamer");
    let renamed = renamed_entity_class_sq(original_entity_class_sq, &renames);
    db_map.override_entity_class_sq_maker(move |_: &dyn ViewSource| renamed.clone());
    Ok(())
}

/// `name` becomes `CASE id WHEN .. THEN new_name ELSE name END`.
fn renamed_entity_class_sq(original: Subquery, renames: &[(i64, String)]) -> Subquery {
    let branches: Vec<_> = renames
        .iter()
        .map(|(id, new_name)| (Predicate::eq("id", *id), Expr::literal(new_name.as_str())))
        .collect();
    let items = original
        .columns()
        .into_iter()
        .map(|column| {
            let expr = if column == "name" {
                Expr::case(branches.clone(), Expr::column("name"))
            } else {
                Expr::column(&column)
            };
            (expr, column)
        })
        .collect();
    original.project(items)
}

pub fn entity_class_renamer_config<K, V>(name_map: impl IntoIterator<Item = (K, V)>) -> FilterConfig
where
    K: Into<String>,
    V: Into<String>,
{
    FilterConfig::EntityClassRenamer {
        name_map: name_map.into_iter().map(|(old, new)| (old.into(), new.into())).collect(),
    }
}

/// `entity_class_rename:old1:new1:old2:new2`
pub fn entity_class_renamer_config_to_shorthand(config: &FilterConfig) -> Result<String> {
    let FilterConfig::EntityClassRenamer { name_map } = config else {
        return Err(Error::InvalidFilterConfig(format!(
            "Expected an entity class renamer, got {}",
            config.filter_type()
        )));
    };
    let mut shorthand = String::from(ENTITY_CLASS_RENAMER_SHORTHAND_TAG);
    for (old, new) in name_map {
        if old.contains(':') || new.contains(':') {
            return Err(Error::InvalidFilterConfig(format!("Cannot rename '{old}' to '{new}' in a shorthand")));
        }
        shorthand.push(':');
        shorthand.push_str(old);
        shorthand.push(':');
        shorthand.push_str(new);
    }
    Ok(shorthand)
}

pub fn entity_class_renamer_shorthand_to_config(shorthand: &str) -> Result<FilterConfig> {
    let names: Vec<&str> = shorthand.split(':').skip(1).collect();
    if names.len() % 2 != 0 {
        return Err(Error::InvalidFilterConfig(format!("Unpaired name in renamer shorthand '{shorthand}'")));
    }
    Ok(entity_class_renamer_config(names.chunks_exact(2).map(|pair| (pair[0], pair[1]))))
}
