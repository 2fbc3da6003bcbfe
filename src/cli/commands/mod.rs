pub mod order;
pub mod product;
pub mod report;
pub mod user;


#[cfg(test)]
#[path = "product_test.rs"]
mod product_test;
