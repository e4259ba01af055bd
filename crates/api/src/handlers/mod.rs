pub mod refrigeration;
