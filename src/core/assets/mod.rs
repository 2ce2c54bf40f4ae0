pub mod asset_index;

pub use asset_index::{
    download_assets, ensure_index, object_url, AssetIndex, AssetObject, DEFAULT_ASSETS_BASE_URL,
};
