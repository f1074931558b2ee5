//! iheartjane 関連の型定義
//!
//! `Raw*` は上流APIのレスポンス形、`Normalized*` は出力するレコード形。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// null を既定値として扱う
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 数値以外 (文字列など) は None として扱う
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| v.as_f64()))
}

/// 真偽値以外も受け付ける。0、空文字、空配列、null は false
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    })
}

/// キー自体が無ければ空文字
fn blank_scalar() -> Option<Scalar> {
    Some(Scalar::Text(String::new()))
}

/// 数値でも文字列でも来るフィールド (ID、価格、含有率)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(Number),
    Text(String),
}

impl Scalar {
    /// 空文字は値なしと同じ扱い
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::Number(value.into())
    }
}

/// 購入単位 (グラム)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GramSize {
    HalfGram,
    Gram,
    TwoGram,
    EighthOunce,
    QuarterOunce,
    HalfOunce,
    Ounce,
}

impl GramSize {
    pub const LADDER: [GramSize; 7] = [
        GramSize::HalfGram,
        GramSize::Gram,
        GramSize::TwoGram,
        GramSize::EighthOunce,
        GramSize::QuarterOunce,
        GramSize::HalfOunce,
        GramSize::Ounce,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GramSize::HalfGram => "half_gram",
            GramSize::Gram => "gram",
            GramSize::TwoGram => "two_gram",
            GramSize::EighthOunce => "eighth_ounce",
            GramSize::QuarterOunce => "quarter_ounce",
            GramSize::HalfOunce => "half_ounce",
            GramSize::Ounce => "ounce",
        }
    }

    pub fn grams(self) -> f64 {
        match self {
            GramSize::HalfGram => 0.5,
            GramSize::Gram => 1.0,
            GramSize::TwoGram => 2.0,
            GramSize::EighthOunce => 3.5,
            GramSize::QuarterOunce => 7.0,
            GramSize::HalfOunce => 14.0,
            GramSize::Ounce => 28.0,
        }
    }
}

// ---- 上流レスポンス ----

/// `stores/ids_by_shopping_preferences` の結果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreIdsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub store_ids: Vec<Scalar>,
}

/// 検索インデックスのクエリ結果
///
/// ヒットは1件ずつデコードするので `Value` のまま保持する。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hits: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facets: HashMap<String, HashMap<String, Value>>,
}

impl SearchResponse {
    /// ファセットの値一覧 (順序は不定)
    pub fn facet_keys(&self, facet: &str) -> Vec<String> {
        self.facets
            .get(facet)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// `brands/<id>` の結果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub brand: RawBrand,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBrand {
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_images: Vec<RawCustomImage>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCustomImage {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// 商品検索のヒット1件
#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    #[serde(rename = "objectID")]
    pub object_id: Scalar,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub kind_subtype: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aggregate_rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<Scalar>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub store_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<RawPhoto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPhoto {
    #[serde(default)]
    pub id: Option<String>,
}

/// `products/<id>/stores` の結果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductStoresResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub stores: Vec<Value>,
}

/// 商品を扱う店舗1件 (価格と含有率を持つ)
#[derive(Debug, Clone, Deserialize)]
pub struct RawStoreVariant {
    pub name: String,
    #[serde(default)]
    pub percent_thc: Option<Scalar>,
    #[serde(default)]
    pub product_percent_cbd: Option<Scalar>,
    pub menu_product: RawMenuProduct,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMenuProduct {
    #[serde(default)]
    pub price_half_gram: Option<Scalar>,
    #[serde(default)]
    pub price_gram: Option<Scalar>,
    #[serde(default)]
    pub price_two_gram: Option<Scalar>,
    #[serde(default)]
    pub price_eighth_ounce: Option<Scalar>,
    #[serde(default)]
    pub price_quarter_ounce: Option<Scalar>,
    #[serde(default)]
    pub price_half_ounce: Option<Scalar>,
    #[serde(default)]
    pub price_ounce: Option<Scalar>,
}

impl RawMenuProduct {
    /// `price_<key>` の値
    pub fn price(&self, size: GramSize) -> Option<&Scalar> {
        match size {
            GramSize::HalfGram => self.price_half_gram.as_ref(),
            GramSize::Gram => self.price_gram.as_ref(),
            GramSize::TwoGram => self.price_two_gram.as_ref(),
            GramSize::EighthOunce => self.price_eighth_ounce.as_ref(),
            GramSize::QuarterOunce => self.price_quarter_ounce.as_ref(),
            GramSize::HalfOunce => self.price_half_ounce.as_ref(),
            GramSize::Ounce => self.price_ounce.as_ref(),
        }
    }
}

/// 店舗検索のヒット1件
#[derive(Debug, Clone, Deserialize)]
pub struct RawDispensary {
    #[serde(rename = "objectID", default)]
    pub object_id: Option<Scalar>,
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub full_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default = "blank_scalar")]
    pub reviews_count: Option<Scalar>,
    #[serde(default, deserialize_with = "truthy")]
    pub medical: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub recreational: bool,
}

// ---- 出力レコード ----

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedBrand {
    #[serde(rename = "banner_image_url")]
    pub banner_image_urls: Vec<String>,
    pub logo_url: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categories {
    pub parent_categories: String,
    pub sub_categories: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rating {
    pub score: Option<f64>,
    pub reviews_count: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct License {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    pub listing: Listing,
    pub unit: &'static str,
    pub price: Scalar,
    pub quantity: f64,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedProduct {
    pub name: String,
    pub categories: Categories,
    pub description: String,
    pub rating: Rating,
    pub license: License,
    pub variants: Vec<Variant>,
    pub image_urls: Vec<String>,
    pub brand: NormalizedBrand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub address: String,
    pub state: String,
    pub city: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDispensary {
    pub logo_url: String,
    pub name: String,
    pub dispensary: Location,
    pub contact: Contact,
    pub description: String,
    pub rating: Rating,
    pub license: License,
    pub brands: Vec<String>,
}
