pub mod blobs;
pub mod noise;
pub mod overlay;
pub mod rectify;
pub mod segmentation;
pub mod side;
pub mod steering;
