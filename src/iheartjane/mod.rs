//! iheartjane スクレイパーモジュール
//!
//! ブランド/ディスペンサリーの2つのパイプラインで上流APIを辿り、
//! 正規化したレコードを JSONL に追記する

mod brands;
mod dispensaries;
pub mod normalize;
pub mod query;
pub mod types;

pub use brands::BrandPipeline;
pub use dispensaries::DispensaryPipeline;
pub use types::{NormalizedBrand, NormalizedDispensary, NormalizedProduct, Scalar, Variant};
