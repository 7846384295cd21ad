pub mod cart;
pub mod discount;
pub mod inventory;
pub mod product;

pub use cart::{CartError, CartLine, CartService, InMemoryCart};
pub use discount::{
    DiscountApplication, DiscountCode, DiscountError, DiscountKind, DiscountLedger, LineAmount,
};
pub use inventory::{InventoryError, InventoryLedger};
pub use product::{CatalogError, ProductCatalog, Variant, VariantSnapshot};
