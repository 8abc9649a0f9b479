use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the opaque ids handed out for uploads and sessions.
pub const PUBLIC_ID_LEN: usize = 12;

/// Random alphanumeric id used to reference uploads and sessions externally.
pub fn public_id() -> String {
    let mut rng = rand::thread_rng();
    (0..PUBLIC_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

pub fn user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
