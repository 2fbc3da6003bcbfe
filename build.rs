//! Build script for embedded migrations.
//!
//! `sqlx::migrate!` reads `migrations/` at compile time, so cargo must
//! rebuild the crate whenever a script is added or edited.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
