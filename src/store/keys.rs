/// Players and scenarios of every adaptation
pub const ADAPTATION_DATA: &str = "TwoAAppSettings.json";

/// Append-only gameplay log
pub const GAMEPLAY_DATA: &str = "gameplaylogs.json";

/// Knowledge structure produced by the binary
pub const KNOWLEDGE_STRUCTURE: &str = "kstructure.xml";

/// Sled tree holding every named document
pub const BLOBS_TREE: &str = "twoa_blobs";
