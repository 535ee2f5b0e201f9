pub mod chart_service;
pub mod indicator_service;
pub mod normalizer;
pub mod pipeline;
pub mod plot_composer;
