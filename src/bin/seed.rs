use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use uuid::Uuid;
use vetcare_api::{config::AppConfig, db::create_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "user", "user@example.com", "user1234", "user").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, is_verified)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Dog Food 10kg", "Dry food for adult dogs", 450000, "food", 40),
        ("Cat Litter 5kg", "Clumping litter", 120000, "supplies", 80),
        ("Flea Collar", "8 weeks of protection", 80000, "health", 150),
        ("Chew Toy", "Rubber bone, medium", 35000, "toys", 200),
    ];

    for (name, desc, price, category, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, image_url, category, stock_quantity)
            VALUES ($1, $2, $3, $4, '', $5, $6)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(category)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    let services = vec![
        ("Grooming", "Full wash and trim", 250000, 60),
        ("Vaccination", "Core vaccines", 150000, 20),
        ("Dental Cleaning", "Scale and polish under sedation", 600000, 90),
    ];

    for (name, desc, price, duration) in services {
        sqlx::query(
            r#"
            INSERT INTO services (id, name, description, price, duration_minutes, image_url)
            SELECT $1, $2, $3, $4, $5, ''
            WHERE NOT EXISTS (SELECT 1 FROM services WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(duration)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
