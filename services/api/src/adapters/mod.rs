pub mod clock;
pub mod db;
pub mod file_store;
pub mod geocoder;
pub mod memory;
pub mod receipt;

pub use clock::SystemClock;
pub use db::DbAdapter;
pub use file_store::FileStorageAdapter;
pub use geocoder::NominatimGeocoder;
pub use memory::InMemoryStorageAdapter;
pub use receipt::HtmlReceiptAdapter;
