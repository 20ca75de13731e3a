//! Status codes returned by the native DMS library.
//!
//! Every `int`-returning call in the C API reports one of these. Zero is
//! success; failures have the high bit set.

use bridge_traits::error::{BridgeError, Result};

pub const SUCCESS: u32 = 0x0000_0000;
pub const LIB_NOT_INITIALIZED: u32 = 0x8000_0003;
pub const KDM_INACTIVE: u32 = 0x8000_000A;
pub const KDM_EXPIRE: u32 = 0x8000_000B;
pub const KDM_RECIPIENT_ERROR: u32 = 0x8000_000D;
pub const NO_ENCRYPT_CONTEXT: u32 = 0x8000_0012;
pub const NO_PICTURE_ESSENCE_FOUND: u32 = 0x8000_0013;
pub const KEY_NOT_FOUND: u32 = 0x8000_0020;
pub const PLAY_FINISHED: u32 = 0x8000_0028;
pub const PREVIEW_FINISHED: u32 = 0x8000_0029;
pub const LIB_INITIALIZED: u32 = 0x8000_002D;

const TABLE: &[(u32, &str, &str)] = &[
    (0x8000_0000, "UNKNOWN_ERROR", "unknown error"),
    (0x8000_0001, "OPEN_AUTH_DB_ERROR", "authorization database could not be opened"),
    (0x8000_0002, "LOAD_KEY_PAIR_ERROR", "device key pair could not be loaded"),
    (LIB_NOT_INITIALIZED, "LIB_NOT_INITIALIZED", "library not initialized"),
    (0x8000_0004, "NO_KDM_SELECTED", "no KDM selected"),
    (0x8000_0005, "KDM_NOT_EXIST", "KDM file does not exist"),
    (0x8000_0006, "KDM_SIGNATURE_ERROR", "KDM signature check failed"),
    (0x8000_0007, "PARSE_KDM_ERROR", "KDM could not be parsed"),
    (0x8000_0008, "KDM_GET_NOTBEFORE_ERROR", "KDM start of validity unreadable"),
    (0x8000_0009, "KDM_GET_NOTAFTER_ERROR", "KDM end of validity unreadable"),
    (KDM_INACTIVE, "KDM_INACTIVE", "KDM not yet valid"),
    (KDM_EXPIRE, "KDM_EXPIRE", "KDM expired"),
    (0x8000_000C, "KDM_GET_RECIPIENT_ERROR", "KDM recipient unreadable"),
    (KDM_RECIPIENT_ERROR, "KDM_RECIPIENT_ERROR", "KDM issued for another device"),
    (0x8000_000E, "KDM_INSUFFICIENT_SESSION_COUNT", "no screenings left on KDM"),
    (0x8000_000F, "KDM_DECRYPT_ERROR", "KDM keys could not be decrypted"),
    (0x8000_0010, "NO_MXF_OPENED", "no MXF opened"),
    (0x8000_0011, "MXF_PARSE_ERROR", "MXF could not be parsed"),
    (NO_ENCRYPT_CONTEXT, "NO_ENCRYPT_CONTEXT", "encrypted track without a bound KDM"),
    (NO_PICTURE_ESSENCE_FOUND, "NO_PICTURE_ESSENCE_FOUND", "no picture essence (or end of essence)"),
    (0x8000_0014, "WRITE_MOVIE_PLAY_LOG_ERROR", "playback log could not be written"),
    (0x8000_0015, "DCP_PATH_NOT_EXIST", "DCP directory does not exist"),
    (0x8000_0016, "NO_DCP_OPENED", "no DCP opened"),
    (0x8000_0017, "VOLINDEX_NOT_EXIST", "VOLINDEX missing"),
    (0x8000_0018, "ASSETMAP_NOT_EXIST", "ASSETMAP missing"),
    (0x8000_0019, "LOAD_ASSETMAP_ERROR", "ASSETMAP could not be loaded"),
    (0x8000_001A, "PKL_NOT_FOUND", "packing list not found"),
    (0x8000_001B, "PKL_NOT_EXIST", "packing list missing"),
    (0x8000_001C, "LOAD_PKL_ERROR", "packing list could not be loaded"),
    (0x8000_001D, "CPL_NOT_EXIST", "composition playlist missing"),
    (0x8000_001E, "LOAD_CPL_ERROR", "composition playlist could not be loaded"),
    (0x8000_001F, "MXF_NOT_EXIST", "MXF file does not exist"),
    (KEY_NOT_FOUND, "KEY_NOT_FOUND", "no key for this MXF in the bound KDM"),
    (0x8000_0021, "KDM_NOT_MATCH_WITH_DCP", "KDM does not match the DCP"),
    (0x8000_0022, "REEL_NOT_EXIST", "reel does not exist"),
    (0x8000_0023, "LOGO_PLAYED", "logo already played"),
    (0x8000_0024, "INIT_FILTER_ERROR", "filter initialization failed"),
    (0x8000_0025, "LOGO_NOT_EXIST", "logo missing"),
    (0x8000_0026, "PARSE_LOGO_ERROR", "logo could not be parsed"),
    (0x8000_0027, "NULL_POINTER_ERROR", "null pointer"),
    (PLAY_FINISHED, "PLAY_FINISHED", "playback finished"),
    (PREVIEW_FINISHED, "PREVIEW_FINISHED", "preview finished"),
    (0x8000_002A, "BREAKPOINT_FINISHED", "resumed playback finished"),
    (0x8000_002B, "VALIDATE_HID_ERROR", "hardware id check failed"),
    (0x8000_002C, "ILLEGAL_MODE", "call not allowed in this library mode"),
    (LIB_INITIALIZED, "LIB_INITIALIZED", "library already initialized"),
    (0x8000_002E, "LOAD_PARAMETER_ERROR", "parameters could not be loaded"),
    (0x8000_002F, "DEVICE_LOCKED", "device locked"),
    (0x8000_0030, "REPORT_LOG_ERROR", "log upload failed"),
    (0x8000_0031, "REPORT_LOG_USER_BREAK", "log upload interrupted"),
];

/// Symbolic name of `code`, `"SUCCESS"` for zero.
pub fn name(code: u32) -> &'static str {
    if code == SUCCESS {
        return "SUCCESS";
    }
    lookup(code).map_or("UNRECOGNIZED", |(name, _)| name)
}

/// Short English description of `code`.
pub fn description(code: u32) -> &'static str {
    if code == SUCCESS {
        return "success";
    }
    lookup(code).map_or("unrecognized status code", |(_, description)| description)
}

fn lookup(code: u32) -> Option<(&'static str, &'static str)> {
    TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == code)
        .map(|&(_, name, description)| (name, description))
}

pub fn is_success(code: u32) -> bool {
    code == SUCCESS
}

/// `true` for the codes the library uses to say the picture track ran out.
pub fn is_end_of_stream(code: u32) -> bool {
    matches!(
        code,
        PLAY_FINISHED | PREVIEW_FINISHED | NO_PICTURE_ESSENCE_FOUND
    )
}

/// Turn a raw status into a `Result`, naming the failing call.
pub fn check(call: &'static str, code: u32) -> Result<()> {
    if is_success(code) {
        Ok(())
    } else {
        Err(BridgeError::Native { call, code })
    }
}
