use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PURPOSE: &[u8] = b"appointment-confirmation:";

fn mac_for(appointment_id: i64, secret: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(PURPOSE);
    mac.update(appointment_id.to_string().as_bytes());
    Some(mac)
}

/// Token embedded in the public confirmation link of an appointment e-mail.
pub fn confirmation_token(appointment_id: i64, secret: &str) -> Option<String> {
    mac_for(appointment_id, secret).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a token taken from a confirmation link.
pub fn verify_confirmation_token(appointment_id: i64, token: &str, secret: &str) -> bool {
    let Ok(bytes) = hex::decode(token.trim()) else {
        return false;
    };
    mac_for(appointment_id, secret).is_some_and(|mac| mac.verify_slice(&bytes).is_ok())
}

pub fn confirmation_url(site_url: &str, appointment_id: i64, secret: &str) -> Option<String> {
    let token = confirmation_token(appointment_id, secret)?;
    Some(format!(
        "{}/appointments/{}/confirm?token={}",
        site_url.trim_end_matches('/'),
        appointment_id,
        token
    ))
}
