pub mod image;
pub mod insights;
pub mod note;
pub mod outline;
pub mod plan;

pub use image::{ClassificationMap, ImageCategory, ImageClassification};
pub use insights::Insights;
pub use note::{NoteDetail, NotePreview, NoteRecord};
pub use outline::{OutlineSection, SectionType};
pub use plan::SearchPlan;
