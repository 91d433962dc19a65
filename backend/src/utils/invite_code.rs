use rand::RngCore;

/// Number of random bytes behind an invite code.
pub const INVITE_CODE_BYTES: usize = 5;

/// Generates a referral invite code.
///
/// The code is `INVITE_CODE_BYTES` bytes from the thread-local CSPRNG rendered
/// as lowercase hex, so it is always 10 characters long. Codes are not checked
/// for uniqueness here; the `users.invite_link` unique index catches
/// collisions and registration retries with a fresh code.
///
/// # Examples
///
/// ```
/// use authapi::utils::invite_code::generate_invite_code;
///
/// let code = generate_invite_code();
/// assert_eq!(code.len(), 10);
/// ```
pub fn generate_invite_code() -> String {
    let mut bytes = [0u8; INVITE_CODE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
