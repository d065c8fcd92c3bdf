// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod folder;
pub mod manager;
pub mod message;
pub mod sync;
pub mod thread;
