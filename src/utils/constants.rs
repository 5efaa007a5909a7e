//! Shared constants of the bank contract

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_AGENCY: u32 = 3995;

// Credentials environment
pub const ENV_HOST: &str = "BILLET_CONSULT_HOST";
pub const ENV_CLIENT_ID: &str = "BILLET_CONSULT_CLIENTID";
pub const ENV_PRIVATE_KEY: &str = "BILLET_CONSULT_KEY";
pub const ENV_PRIVATE_KEY_FILE: &str = "BILLET_CONSULT_KEY_FILE";

// Bank routes
pub const TOKEN_ROUTE: &str = "/auth/server/v1.1/token";
pub const VALIDATION_ROUTE: &str = "/oapi/v1/pagamentos/boleto/validarDadosTitulo";

pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const ASSERTION_VERSION: &str = "1.1";
/// `tipoEntrada` for a 44-digit barcode
pub const ENTRY_TYPE_BARCODE: u8 = 1;
