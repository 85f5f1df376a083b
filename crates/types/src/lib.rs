pub mod color;
pub mod geometry;
pub mod ids;
pub mod product;
pub mod raster;
pub mod send;
pub mod template;

pub use color::Color;
pub use geometry::{Frame, Position, Size};
pub use ids::{BranchId, SendId};
pub use product::{EditedProduct, Product};
pub use raster::RasterImage;
pub use send::{Branch, DeliveryStatus, SendBatch, SendItem, SendStatus};
pub use template::{Canvas, Template, TemplateComponent};
