use rand::Rng;
use uuid::Uuid;

use crate::auth::password;

/// Demo accounts available out of the box. One per role.
const DEMO_USERS: &[(&str, &str, &str, &str)] = &[
    ("Alice PM", "alice@example.com", "demo123", "pm"),
    ("Bob Finance", "bob@example.com", "demo123", "finance"),
    ("Carol Admin", "carol@example.com", "demo123", "admin"),
];

/// Seed the demo user accounts. Idempotent: users that already exist
/// (by email) are left untouched.
pub fn seed_demo_users(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    for (name, email, pass, role) in DEMO_USERS {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            [email],
            |row| row.get(0),
        )?;
        if exists > 0 {
            continue;
        }

        let salt: [u8; 16] = rand::rng().random();
        let salt_hex = hex::encode(salt);
        let hash = password::hash_password(&salt_hex, pass);

        conn.execute(
            "INSERT INTO users (id, name, email, role, password_salt, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![Uuid::new_v4().to_string(), name, email, role, salt_hex, hash],
        )?;
        tracing::info!(email = %email, role = %role, "Seeded demo user");
    }

    Ok(())
}
