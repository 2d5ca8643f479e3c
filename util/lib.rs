/*!
This crate contains small utilities shared by the other kitsune crates.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod finite;
pub mod numeric;
pub mod progress_counter;
pub mod table;
