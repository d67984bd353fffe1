//! Fixed identifiers of the test service binding.

/// Client id of the service under test.
pub const TEST_CLIENT_ID: &str = "sb-java-hello-world";

/// Secret of the service under test.
pub const TEST_CLIENT_SECRET: &str = "basic.clientsecret";

/// Application name; scopes are prefixed with it.
pub const TEST_XSAPPNAME: &str = "java-hello-world";

/// End user known to the mock XSUAA.
pub const TEST_USER: &str = "basic.user";
pub const TEST_PASSWORD: &str = "basic.password";

/// Identity provider (origin) of the test user.
pub const TEST_ORIGIN: &str = "useridp";

/// `user_name` claim of tokens issued for the test user.
pub const TEST_USER_NAME: &str = "Mustermann";

/// Principal name the broker reports for the test user.
pub const TEST_USER_PRINCIPAL: &str = "user/useridp/Mustermann";

/// Subject of tokens issued for the test user.
pub const TEST_USER_ID: &str = "0cbc3b4f-1d5a-4c1e-9f7a-1b2d3c4e5f60";

/// Identity zone of the test tenant.
pub const TEST_ZONE_ID: &str = "uaa";

/// A client that is not the service under test.
pub const FOREIGN_CLIENT_ID: &str = "sb-other-app";
pub const FOREIGN_CLIENT_SECRET: &str = "other.clientsecret";

/// Key ids published by the mock `token_keys` endpoint.
pub const RSA_KEY_ID: &str = "key-id-1";
pub const ED25519_KEY_ID: &str = "key-id-2";
