//! Raw star catalogs.

pub mod hipparcos;

pub use hipparcos::{
    load_hipparcos_catalog, load_hipparcos_catalog_from_file, CatalogLoad, HipparcosRecord,
};
