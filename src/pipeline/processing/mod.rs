// Pipeline processing: JSON-to-relational normalization

pub mod normalize;
