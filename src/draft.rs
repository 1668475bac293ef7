//! Conversions between wire products, editable drafts and update payloads.
//!
//! Coercion here is total by design: whatever the backend or the form hands
//! over, the outcome is a finite number, a bool, or a normalized photo list.

use crate::models::{Draft, Product, ProductPayload, WireProduct};
use crate::photos::{normalize_photo_text, normalize_photos, photos_to_text};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Finite number from a loosely typed wire value. Null and empty text are
/// zero; unparseable or non-finite input is zero.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(text) => number_from_text(text),
        _ => 0.0,
    }
}

/// Finite number from form text. Same rules as [`coerce_number`].
pub fn number_from_text(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Availability flag from a loosely typed wire value (the backend has sent
/// `true`, `1` and `"1"` at various points).
pub fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

pub fn normalize_product(wire: WireProduct) -> Product {
    Product {
        id: wire.id,
        name: wire.name.unwrap_or_default(),
        category: wire.category.unwrap_or_default(),
        description: wire.description.unwrap_or_default(),
        available: coerce_flag(&wire.available),
        price: coerce_number(&wire.price),
        weight: coerce_number(&wire.weight),
        calories: coerce_number(&wire.calories),
        proteins: coerce_number(&wire.proteins),
        fats: coerce_number(&wire.fats),
        carbohydrates: coerce_number(&wire.carbohydrates),
        photos: normalize_photos(&wire.photos),
    }
}

pub fn draft_from_product(product: &Product) -> Draft {
    let photos = product.photos.clone();
    Draft {
        id: product.id,
        name: product.name.clone(),
        category: product.category.clone(),
        description: product.description.clone(),
        available: product.available,
        price: product.price.to_string(),
        weight: product.weight.to_string(),
        calories: product.calories.to_string(),
        proteins: product.proteins.to_string(),
        fats: product.fats.to_string(),
        carbohydrates: product.carbohydrates.to_string(),
        photos_text: photos_to_text(&photos),
        photos,
    }
}

/// Update payload from a draft: photos re-derived from the free-text view,
/// numeric fields re-coerced.
pub fn build_payload(draft: &Draft) -> ProductPayload {
    ProductPayload {
        id: draft.id,
        name: draft.name.clone(),
        category: draft.category.clone(),
        description: draft.description.clone(),
        available: draft.available,
        price: number_from_text(&draft.price),
        weight: number_from_text(&draft.weight),
        calories: number_from_text(&draft.calories),
        proteins: number_from_text(&draft.proteins),
        fats: number_from_text(&draft.fats),
        carbohydrates: number_from_text(&draft.carbohydrates),
        photos: normalize_photo_text(&draft.photos_text),
    }
}

pub fn payload_from_product(product: &Product) -> ProductPayload {
    ProductPayload {
        id: product.id,
        name: product.name.clone(),
        category: product.category.clone(),
        description: product.description.clone(),
        available: product.available,
        price: product.price,
        weight: product.weight,
        calories: product.calories,
        proteins: product.proteins,
        fats: product.fats,
        carbohydrates: product.carbohydrates,
        photos: product.photos.clone(),
    }
}

/// Saved payloads go straight back into the product list, so the list shows
/// exactly what was persisted without a refetch.
pub fn product_from_payload(payload: &ProductPayload) -> Product {
    Product {
        id: payload.id,
        name: payload.name.clone(),
        category: payload.category.clone(),
        description: payload.description.clone(),
        available: payload.available,
        price: payload.price,
        weight: payload.weight,
        calories: payload.calories,
        proteins: payload.proteins,
        fats: payload.fats,
        carbohydrates: payload.carbohydrates,
        photos: payload.photos.clone(),
    }
}

/// A draft counts as modified once its payload no longer matches the payload
/// its source product would produce. Field-by-field comparison, so the
/// result does not depend on any serialization order.
pub fn is_dirty(product: &Product, draft: &Draft) -> bool {
    payload_from_product(product) != build_payload(draft)
}

/// Drop the first occurrence of `target_url`, leaving duplicates in place.
pub fn remove_first_photo_match(photos: &[String], target_url: &str) -> Vec<String> {
    let Some(index) = photos.iter().position(|photo| photo == target_url) else {
        return photos.to_vec();
    };
    let mut next = photos.to_vec();
    next.remove(index);
    next
}

/// Local file staged for upload. Re-selecting the same file (same name,
/// size and mtime) replaces the earlier staging instead of duplicating it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPhotoFile {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
    pub path: PathBuf,
}

impl PendingPhotoFile {
    fn key(&self) -> (String, u64, SystemTime) {
        (self.name.clone(), self.size, self.modified)
    }
}

/// Merge newly selected files into the staged set, deduplicating by
/// (name, size, mtime). First-appearance order is kept; the latest
/// selection wins for a repeated key.
pub fn merge_photo_files(
    existing: &[PendingPhotoFile],
    incoming: &[PendingPhotoFile],
) -> Vec<PendingPhotoFile> {
    let mut merged: Vec<PendingPhotoFile> = Vec::with_capacity(existing.len() + incoming.len());
    let mut slots: HashMap<(String, u64, SystemTime), usize> = HashMap::new();

    for file in existing.iter().chain(incoming) {
        match slots.get(&file.key()) {
            Some(&slot) => merged[slot] = file.clone(),
            None => {
                slots.insert(file.key(), merged.len());
                merged.push(file.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn sample_product() -> Product {
        normalize_product(
            serde_json::from_value(json!({
                "id": 7,
                "name": "Napoleon",
                "category": "Cakes",
                "description": "Layered",
                "available": 1,
                "price": "250.5",
                "weight": 120,
                "calories": "410",
                "proteins": null,
                "fats": "7.2",
                "carbohydrates": "abc",
                "photos": "a.jpg, b.jpg\nc.jpg"
            }))
            .unwrap(),
        )
    }

    #[test]
    fn numeric_coercion_is_total() {
        assert_eq!(coerce_number(&json!("12.5")), 12.5);
        assert_eq!(coerce_number(&json!(" 3 ")), 3.0);
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&Value::Null), 0.0);
        assert_eq!(coerce_number(&json!("abc")), 0.0);
        assert_eq!(coerce_number(&json!("NaN")), 0.0);
        assert_eq!(coerce_number(&json!("inf")), 0.0);
        assert_eq!(number_from_text("   "), 0.0);
    }

    #[test]
    fn wire_product_normalizes_photos_and_numbers() {
        let product = sample_product();
        assert!(product.available);
        assert_eq!(product.price, 250.5);
        assert_eq!(product.proteins, 0.0);
        assert_eq!(product.carbohydrates, 0.0);
        assert_eq!(product.photos, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn payload_numbers_survive_the_draft_round_trip() {
        let product = sample_product();
        let via_draft = build_payload(&draft_from_product(&product));
        let direct = payload_from_product(&product);
        assert_eq!(via_draft.price, direct.price);
        assert_eq!(via_draft.weight, direct.weight);
        assert_eq!(via_draft.calories, direct.calories);
        assert_eq!(via_draft.proteins, direct.proteins);
        assert_eq!(via_draft.fats, direct.fats);
        assert_eq!(via_draft.carbohydrates, direct.carbohydrates);
    }

    #[test]
    fn fresh_draft_is_clean_until_edited() {
        let product = sample_product();
        let mut draft = draft_from_product(&product);
        assert!(!is_dirty(&product, &draft));

        draft.name = "Napoleon XL".to_string();
        assert!(is_dirty(&product, &draft));

        let mut draft = draft_from_product(&product);
        draft.photos_text = "a.jpg".to_string();
        assert!(is_dirty(&product, &draft));
    }

    #[test]
    fn reformatted_photo_text_with_same_urls_stays_clean() {
        let product = sample_product();
        let mut draft = draft_from_product(&product);
        draft.photos_text = "a.jpg,b.jpg\nc.jpg".to_string();
        assert!(!is_dirty(&product, &draft));
    }

    #[test]
    fn remove_first_match_keeps_later_duplicates() {
        let photos = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(remove_first_photo_match(&photos, "a"), vec!["b", "a"]);
        assert_eq!(remove_first_photo_match(&photos, "missing"), photos);
    }

    fn staged(name: &str, size: u64, secs: u64) -> PendingPhotoFile {
        PendingPhotoFile {
            name: name.to_string(),
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            path: PathBuf::from(format!("/tmp/{name}")),
        }
    }

    #[test]
    fn staged_files_dedup_by_name_size_and_mtime() {
        let existing = vec![staged("a.jpg", 10, 1), staged("b.jpg", 20, 2)];
        let incoming = vec![staged("a.jpg", 10, 1), staged("c.jpg", 30, 3)];
        let merged = merge_photo_files(&existing, &incoming);
        assert_eq!(
            merged.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["a.jpg", "b.jpg", "c.jpg"]
        );

        // Same name but different mtime is a distinct selection.
        let incoming = vec![staged("a.jpg", 10, 9)];
        let merged = merge_photo_files(&existing, &incoming);
        assert_eq!(merged.len(), 3);
    }
}
