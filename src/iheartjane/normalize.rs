//! 上流レスポンスを出力レコードに変換する純粋関数群

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ScraperError;

use super::types::{
    Categories, Contact, GramSize, License, Listing, Location, Metrics, NormalizedBrand,
    NormalizedDispensary, NormalizedProduct, Rating, RawBrand, RawDispensary, RawProduct,
    RawStoreVariant, Scalar, Variant,
};

/// ヒット1件を型付きでデコードする
pub fn decode_entity<T: DeserializeOwned>(value: &Value) -> Result<T, ScraperError> {
    Ok(T::deserialize(value)?)
}

/// ログ用のエンティティ名。取れなければ "unknown"
pub fn entity_label(value: &Value) -> &str {
    value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

pub fn normalize_brand(raw: &RawBrand) -> NormalizedBrand {
    NormalizedBrand {
        banner_image_urls: raw
            .custom_images
            .iter()
            .map(|img| img.image_url.clone().unwrap_or_default())
            .collect(),
        logo_url: raw.logo_url.clone().unwrap_or_default(),
        name: raw.name.clone().unwrap_or_default(),
        description: raw.description.clone().unwrap_or_default(),
    }
}

fn percentage(value: Option<&Scalar>) -> Option<String> {
    value.filter(|v| !v.is_blank()).map(|v| format!("{}%", v))
}

/// 店舗1件をグラム単位ごとの Variant に展開する
///
/// 価格フィールドが存在し null でない単位だけを出力する。
pub fn normalize_variants(raw: &RawStoreVariant) -> Vec<Variant> {
    let metrics = Metrics {
        thc: percentage(raw.percent_thc.as_ref()),
        cbd: percentage(raw.product_percent_cbd.as_ref()),
    };

    GramSize::LADDER
        .iter()
        .filter_map(|&size| {
            let price = raw.menu_product.price(size).filter(|p| !p.is_blank())?;
            Some(Variant {
                listing: Listing {
                    name: raw.name.clone(),
                },
                unit: "g",
                price: price.clone(),
                quantity: size.grams(),
                metrics: metrics.clone(),
            })
        })
        .collect()
}

/// `stores` 配列全体を展開する。壊れた店舗はスキップし、その件数を返す
pub fn variants_from_stores(stores: &[Value]) -> (Vec<Variant>, usize) {
    let mut variants = Vec::new();
    let mut skipped = 0;

    for store in stores {
        match decode_entity::<RawStoreVariant>(store) {
            Ok(raw) => variants.extend(normalize_variants(&raw)),
            Err(e) => {
                skipped += 1;
                warn!(store = entity_label(store), "Failed to parse variant: {}", e);
            }
        }
    }

    (variants, skipped)
}

pub fn normalize_product(
    raw: &RawProduct,
    brand: &NormalizedBrand,
    variants: Vec<Variant>,
) -> NormalizedProduct {
    NormalizedProduct {
        name: raw.name.clone(),
        categories: Categories {
            parent_categories: raw.category.clone().unwrap_or_default(),
            sub_categories: raw.kind_subtype.clone().unwrap_or_default(),
        },
        description: raw.description.clone().unwrap_or_default(),
        rating: Rating {
            score: raw.aggregate_rating,
            reviews_count: raw.review_count.clone(),
        },
        license: License {
            license_type: Some(raw.store_types.join(" & ")),
        },
        variants,
        image_urls: raw.photos.iter().filter_map(|p| p.id.clone()).collect(),
        brand: brand.clone(),
    }
}

/// 医療用/嗜好用フラグからライセンス種別を決める
pub fn license_type(medical: bool, recreational: bool) -> Option<&'static str> {
    match (medical, recreational) {
        (true, true) => Some("Recreational and Medical"),
        (true, false) => Some("Medical"),
        (false, true) => Some("Recreational"),
        (false, false) => None,
    }
}

/// 住所の最後のカンマ区切り要素。郵便番号として検証はしない
pub fn zip_code(address: &str) -> String {
    address.rsplit(',').next().unwrap_or_default().trim().to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn normalize_dispensary(raw: &RawDispensary, brands: Vec<String>) -> NormalizedDispensary {
    let address = raw.full_address.clone().unwrap_or_default();

    NormalizedDispensary {
        logo_url: raw.photo.clone().unwrap_or_default(),
        name: raw.name.clone(),
        dispensary: Location {
            zip_code: zip_code(&address),
            address,
            state: raw.state.clone().unwrap_or_default(),
            city: raw.city.clone().unwrap_or_default(),
        },
        contact: Contact {
            phone_number: raw.phone.clone().unwrap_or_default(),
        },
        description: raw.description.clone().unwrap_or_default(),
        rating: Rating {
            score: raw.rating.map(round2),
            reviews_count: raw.reviews_count.clone(),
        },
        license: License {
            license_type: license_type(raw.medical, raw.recreational).map(str::to_string),
        },
        brands,
    }
}
