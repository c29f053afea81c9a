//! Use-case services layered over the persistence context.

pub mod category_service;
