// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core domain types: session ids, session records, and conversion records.

pub mod ids;
pub mod session;

pub use ids::{validate_path_segment, Id, IdError, SessionId, SessionIdTag};
pub use session::{epoch_seconds_now, ConversionRecord, SessionRecord};
