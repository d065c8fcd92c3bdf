// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Caller-side errors (10000–10999)
    MissingConfiguration = 10010,

    // Resource errors (30000–30999)
    ResourceNotFound = 30000,

    // Cache consistency errors (50000–50999)
    DataCorrupted = 50000,

    // Synchronization outcomes (60000–60999)
    SyncCancelled = 60000,

    // Internal system errors (70000–70999)
    InternalError = 70000,
}
