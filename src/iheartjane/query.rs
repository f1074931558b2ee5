//! iheartjane のURLと検索クエリ本文
//!
//! 検索インデックスは `{query, filters, facets, hitsPerPage, aroundLatLng,
//! aroundRadius, attributesToRetrieve, facetFilters}` のJSON本文を受け付ける。

use serde_json::json;
use url::Url;

use crate::config::{Endpoints, Region};
use crate::error::ScraperError;

use super::types::Scalar;

pub const MENU_PRODUCTS_INDEX: &str = "menu-products-production";
pub const PRODUCTS_INDEX: &str = "products-production";
pub const STORES_INDEX: &str = "stores-production";

/// 店舗ID検索の距離 (マイル)
const STORE_SEARCH_DISTANCE: &str = "100";
/// 商品の取扱店舗検索の半径 (マイル)
const PRODUCT_STORE_RADIUS: &str = "200";
/// ブランドID集計の半径 (メートル, 約20マイル)
const BRAND_FACET_RADIUS_METERS: u64 = 32187;
/// ディスペンサリー検索の半径 (メートル, 約315マイル)
const DISPENSARY_RADIUS_METERS: u64 = 507913;
const BRAND_PRODUCTS_LIMIT: u64 = 1000;
const DISPENSARY_LIMIT: u64 = 10000;

pub fn index_query_url(endpoints: &Endpoints, index: &str) -> String {
    format!("{}/{}/query", endpoints.search_base.trim_end_matches('/'), index)
}

fn api_url(endpoints: &Endpoints, path: &str) -> String {
    format!("{}/{}", endpoints.api_base.trim_end_matches('/'), path)
}

/// 地域内の受け取り可能な店舗ID
pub fn store_ids_url(endpoints: &Endpoints, region: Region) -> Result<String, ScraperError> {
    let url = Url::parse_with_params(
        &api_url(endpoints, "stores/ids_by_shopping_preferences"),
        &[
            ("lat", region.latitude.to_string()),
            ("long", region.longitude.to_string()),
            ("distance", STORE_SEARCH_DISTANCE.to_string()),
            ("fulfillment_type", "pickup".to_string()),
            ("store_type", "all".to_string()),
        ],
    )?;
    Ok(url.into())
}

pub fn brand_url(endpoints: &Endpoints, brand_id: &str) -> String {
    api_url(endpoints, &format!("brands/{}", brand_id))
}

/// 商品の取扱店舗と価格
pub fn product_stores_url(
    endpoints: &Endpoints,
    product_id: &Scalar,
    region: Region,
) -> Result<String, ScraperError> {
    let url = Url::parse_with_params(
        &api_url(endpoints, &format!("products/{}/stores", product_id)),
        &[
            ("lat", region.latitude.to_string()),
            ("long", region.longitude.to_string()),
            ("max_search_radius", PRODUCT_STORE_RADIUS.to_string()),
        ],
    )?;
    Ok(url.into())
}

/// 店舗IDの OR フィルター ("store_id:A OR store_id:B")
pub fn store_filter(store_ids: &[Scalar]) -> String {
    store_ids
        .iter()
        .map(|id| format!("store_id:{}", id))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// 店舗群で扱われているブランドIDをファセットで集計する
pub fn brand_ids_payload(store_ids: &[Scalar], region: Region) -> String {
    json!({
        "query": "",
        "filters": format!("({}) AND store_specific_product:false", store_filter(store_ids)),
        "aroundLatLng": region.to_string(),
        "aroundRadius": BRAND_FACET_RADIUS_METERS,
        "attributesToRetrieve": ["product_brand_id"],
        "facets": ["product_brand_id", "applicable_brand_special_ids"],
        "facetFilters": ["at_visible_store:true"],
    })
    .to_string()
}

pub fn brand_products_payload(brand_id: &str) -> String {
    json!({
        "query": "",
        "filters": format!("brand_id:{}", brand_id),
        "hitsPerPage": BRAND_PRODUCTS_LIMIT,
        "facets": ["*"],
    })
    .to_string()
}

pub fn dispensaries_payload(region: Region) -> String {
    json!({
        "query": "",
        "filters": "marketplace_visible:true",
        "hitsPerPage": DISPENSARY_LIMIT,
        "aroundLatLng": region.to_string(),
        "aroundRadius": DISPENSARY_RADIUS_METERS,
        "facets": ["*"],
    })
    .to_string()
}

/// 1店舗で扱われているブランド名をファセットで集計する
pub fn store_brands_payload(store_id: &Scalar) -> String {
    json!({
        "query": "",
        "filters": format!("store_id ={}", store_id),
        "facets": ["*"],
    })
    .to_string()
}
