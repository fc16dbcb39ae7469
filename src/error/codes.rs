/// Error code registry for ObfusEngine
///
/// Error codes are organized by category:
/// - 1000-1999: Validation errors
/// - 2000-2999: Environment errors
/// - 3000-3999: Technique failures
/// - 4000-4999: Pipeline errors
/// - 5000-5999: Presentation errors
/// - 6000-6999: Configuration errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Validation errors (1000-1999)
    pub const VALIDATION_GENERIC: u16 = 1000;
    pub const VALIDATION_SCRIPT_PATH: u16 = 1001;
    pub const VALIDATION_IP: u16 = 1002;
    pub const VALIDATION_PORT: u16 = 1003;
    pub const VALIDATION_OUTPUT_NAME: u16 = 1004;
    pub const VALIDATION_TECHNIQUES: u16 = 1005;
    pub const VALIDATION_INCOMPLETE: u16 = 1006;

    // Environment errors (2000-2999)
    pub const ENV_MISSING_TOOL: u16 = 2001;
    pub const ENV_MISSING_INTERPRETER: u16 = 2002;
    pub const ENV_DECLINED: u16 = 2003;

    // Technique failures (3000-3999)
    pub const TECHNIQUE_GENERIC: u16 = 3000;
    pub const TECHNIQUE_EXIT_CODE: u16 = 3001;
    pub const TECHNIQUE_MISSING_OUTPUT: u16 = 3002;
    pub const TECHNIQUE_TIMEOUT: u16 = 3003;
    pub const TECHNIQUE_SPAWN: u16 = 3004;

    // Pipeline errors (4000-4999)
    pub const PIPELINE_NO_SUCCESS: u16 = 4001;
    pub const PIPELINE_MISSING_ARTIFACT: u16 = 4002;
    pub const PIPELINE_INTERRUPTED: u16 = 4003;
    pub const PIPELINE_INPUT: u16 = 4004;

    // Presentation errors (5000-5999)
    pub const PRESENTATION_GENERIC: u16 = 5000;
    pub const PRESENTATION_CLIPBOARD: u16 = 5001;
    pub const PRESENTATION_ENCODING: u16 = 5002;

    // Configuration errors (6000-6999)
    pub const CONFIG_GENERIC: u16 = 6000;
    pub const CONFIG_PARSE_ERROR: u16 = 6001;
    pub const CONFIG_INVALID_VALUE: u16 = 6002;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_IO: u16 = 9001;
}

/// Short description of an error code, shown with `--verbose` fatal errors.
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::VALIDATION_SCRIPT_PATH => "Input script rejected",
        ErrorCode::VALIDATION_IP => "Invalid IP address literal",
        ErrorCode::VALIDATION_PORT => "Port outside 1-65535",
        ErrorCode::VALIDATION_OUTPUT_NAME => "Unsafe output filename",
        ErrorCode::VALIDATION_TECHNIQUES => "Invalid technique selection",
        ErrorCode::VALIDATION_INCOMPLETE => "Configuration incomplete",
        1000..=1999 => "Validation error",
        ErrorCode::ENV_MISSING_TOOL => "Backing tool not found",
        ErrorCode::ENV_MISSING_INTERPRETER => "Interpreter not runnable",
        ErrorCode::ENV_DECLINED => "Operator declined to continue with missing tools",
        2000..=2999 => "Environment error",
        ErrorCode::TECHNIQUE_TIMEOUT => "Technique timed out",
        3000..=3999 => "Technique failure",
        ErrorCode::PIPELINE_NO_SUCCESS => "No technique succeeded",
        ErrorCode::PIPELINE_MISSING_ARTIFACT => "Final artifact missing",
        ErrorCode::PIPELINE_INTERRUPTED => "Run interrupted",
        4000..=4999 => "Pipeline error",
        ErrorCode::PRESENTATION_CLIPBOARD => "Clipboard unavailable",
        5000..=5999 => "Presentation error",
        6000..=6999 => "Configuration error",
        _ => "Unknown error",
    }
}
