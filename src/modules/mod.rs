// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod cache;
pub mod common;
pub mod context;
pub mod database;
pub mod error;
pub mod logger;
pub mod settings;
pub mod utils;
