use serde_json::Value;
use tracing::info;

use crate::{Card, ImportError, NewCard, Repository, MAX_FIELD_CHARS};

/// Parses an import file: a JSON array of `{"front": ..., "back": ...}` objects.
/// Every item is validated before anything is returned.
pub fn parse_import(text: &str) -> Result<Vec<NewCard>, ImportError> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Array(items) = root else {
        return Err(ImportError::Validation("JSON root is not a list".into()));
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            return Err(ImportError::Validation(format!("item {i} is not an object")));
        };
        let (Some(front), Some(back)) = (obj.get("front"), obj.get("back")) else {
            return Err(ImportError::Validation(format!("item {i} is missing 'front' or 'back'")));
        };
        let (Some(front), Some(back)) = (front.as_str(), back.as_str()) else {
            return Err(ImportError::Validation(format!("item {i}: 'front' and 'back' must be strings")));
        };
        if front.chars().count() > MAX_FIELD_CHARS || back.chars().count() > MAX_FIELD_CHARS {
            return Err(ImportError::Validation(format!(
                "item {i}: card content exceeds {MAX_FIELD_CHARS} characters"
            )));
        }
        let card = NewCard::new(front, back).map_err(|e| ImportError::Validation(format!("item {i}: {e}")))?;
        out.push(card);
    }
    Ok(out)
}

/// Validates the whole file, then inserts every card.
pub async fn import_cards<R: Repository + ?Sized>(repo: &R, text: &str) -> Result<Vec<Card>, ImportError> {
    let parsed = parse_import(text)?;
    let mut added = Vec::with_capacity(parsed.len());
    for new_card in parsed {
        added.push(repo.add_card(new_card).await?);
    }
    info!(count = added.len(), "cards imported");
    Ok(added)
}
