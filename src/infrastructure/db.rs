use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Set,
    Statement,
};

use crate::domain::{clock, Role};
use crate::models::{chatbot_fallback_response, role};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;
    seed_roles(&db).await?;
    seed_fallback_responses(&db).await?;

    Ok(db)
}

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        role_name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role_id INTEGER NOT NULL REFERENCES roles(id),
        last_login_at TEXT,
        last_login_ip TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_name TEXT NOT NULL UNIQUE,
        description TEXT,
        schema_definition TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vendor_name TEXT NOT NULL,
        contact_info TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        inventory_number TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        category_id INTEGER NOT NULL REFERENCES categories(id),
        vendor_id INTEGER REFERENCES vendors(id) ON DELETE SET NULL,
        location TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'available'
            CHECK (status IN ('available', 'lent', 'maintenance', 'retired', 'donated')),
        condition_status TEXT,
        specifications TEXT,
        current_holder_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        purchase_date TEXT,
        purchase_value REAL,
        warranty_expiry_date TEXT,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_items_status ON items(status)",
    "CREATE INDEX IF NOT EXISTS idx_items_category_id ON items(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_current_holder_id ON items(current_holder_id)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        checkout_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        return_date TEXT,
        status TEXT NOT NULL DEFAULT 'active'
            CHECK (status IN ('active', 'returned', 'late_return', 'cancelled')),
        late_fee REAL NOT NULL DEFAULT 0 CHECK (late_fee >= 0),
        late_fee_paid BOOLEAN NOT NULL DEFAULT 0,
        return_condition TEXT,
        return_notes TEXT,
        notes TEXT,
        checked_out_by INTEGER REFERENCES users(id),
        returned_to INTEGER REFERENCES users(id),
        overdue_reminder_sent BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_status_due_date ON transactions(status, due_date)",
    // At most one open loan per item, even across racing checkouts
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_one_active_per_item ON transactions(item_id) WHERE status = 'active'",
    r#"
    CREATE TABLE IF NOT EXISTS maintenance_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        requested_by INTEGER NOT NULL REFERENCES users(id),
        assigned_to INTEGER REFERENCES users(id),
        transaction_id INTEGER REFERENCES transactions(id),
        maintenance_type TEXT NOT NULL,
        priority TEXT NOT NULL DEFAULT 'medium',
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'in_progress', 'completed', 'cancelled')),
        description TEXT NOT NULL,
        resolution_notes TEXT,
        cost REAL CHECK (cost IS NULL OR cost >= 0),
        scheduled_date TEXT,
        completed_date TEXT,
        sla_hours INTEGER NOT NULL,
        sla_due_date TEXT NOT NULL,
        resolution_target TEXT NOT NULL,
        first_response_at TEXT,
        resolved_at TEXT,
        sla_breached BOOLEAN NOT NULL DEFAULT 0,
        sla_breach_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_maintenance_requests_status ON maintenance_requests(status)",
    "CREATE INDEX IF NOT EXISTS idx_maintenance_requests_item_id ON maintenance_requests(item_id)",
    r#"
    CREATE TABLE IF NOT EXISTS purchase_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_name TEXT NOT NULL,
        description TEXT NOT NULL,
        category TEXT,
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        estimated_cost REAL CHECK (estimated_cost IS NULL OR estimated_cost >= 0),
        justification TEXT NOT NULL,
        requested_by INTEGER NOT NULL REFERENCES users(id),
        approved_by INTEGER REFERENCES users(id),
        reviewed_by INTEGER REFERENCES users(id),
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'approved', 'rejected', 'ordered', 'received', 'cancelled')),
        priority TEXT NOT NULL DEFAULT 'medium'
            CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
        rejection_reason TEXT,
        needed_by_date TEXT,
        approved_cost REAL,
        actual_cost REAL,
        vendor_id INTEGER REFERENCES vendors(id),
        actual_quantity INTEGER,
        approved_date TEXT,
        ordered_date TEXT,
        received_date TEXT,
        expected_delivery_date TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_purchase_requests_status ON purchase_requests(status)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        kind TEXT NOT NULL DEFAULT 'info',
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        action_url TEXT,
        action_text TEXT,
        read_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id, read_at)",
    r#"
    CREATE TABLE IF NOT EXISTS item_lifecycle_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        event_type TEXT NOT NULL,
        notes TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_item_lifecycle_events_item_id ON item_lifecycle_events(item_id)",
    r#"
    CREATE TABLE IF NOT EXISTS chatbot_fallback_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        trigger_keyword TEXT NOT NULL UNIQUE,
        response_text TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        usage_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chatbot_queries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        query TEXT NOT NULL,
        query_type TEXT NOT NULL,
        was_successful BOOLEAN NOT NULL DEFAULT 0,
        result_count INTEGER NOT NULL DEFAULT 0,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        used_fallback BOOLEAN NOT NULL DEFAULT 0,
        fallback_response_id INTEGER REFERENCES chatbot_fallback_responses(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chatbot_feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chatbot_query_id INTEGER NOT NULL REFERENCES chatbot_queries(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        rating TEXT NOT NULL CHECK (rating IN ('helpful', 'not_helpful', 'partially_helpful')),
        comment TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (chatbot_query_id, user_id)
    )
    "#,
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in MIGRATIONS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }
    tracing::debug!("Applied {} schema statements", MIGRATIONS.len());
    Ok(())
}

/// The three roles are reference data every deployment needs.
async fn seed_roles(db: &DatabaseConnection) -> Result<(), DbErr> {
    if role::Entity::find().count(db).await? > 0 {
        return Ok(());
    }

    let now = clock::now_ts();
    let rows = Role::ALL.iter().map(|r| role::ActiveModel {
        role_name: Set(r.name().to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    });
    role::Entity::insert_many(rows).exec(db).await?;
    tracing::info!("Seeded default roles");
    Ok(())
}

// Canned chatbot answers used when the AI service cannot answer.
const FALLBACK_RESPONSES: &[(&str, &str)] = &[
    (
        "yardım",
        "Size nasıl yardımcı olabilirim? Envanter hakkında sorular sorabilirsiniz, örneğin: \"Kaç tane monitör var?\", \"Boşta olan osiloskoplar hangileri?\"",
    ),
    (
        "help",
        "How can I help you? You can ask about the inventory, for example: \"How many monitors are there?\", \"Which oscilloscopes are available?\"",
    ),
    (
        "merhaba",
        "Merhaba! Laboratuvar envanter asistanına hoş geldiniz. Ne öğrenmek istersiniz?",
    ),
    (
        "hello",
        "Hello! Welcome to the lab inventory assistant. What would you like to know?",
    ),
    ("teşekkür", "Rica ederim! Başka bir sorunuz varsa sormaktan çekinmeyin."),
    ("thank", "You're welcome! Feel free to ask if you have any other questions."),
    (
        "neler yapabilirsin",
        "Envanter hakkında sorulara cevap verebilirim:\n- \"Kaç tane X var?\" (sayım)\n- \"Hangi eşyalar boşta?\" (durum)\n- \"X nerede?\" (konum)\n- \"Y kimde?\" (zimmet)\n- \"Bu hafta eklenen eşyalar\" (zaman)",
    ),
    (
        "what can you do",
        "I can answer questions about the inventory:\n- \"How many X are there?\" (counting)\n- \"Which items are available?\" (status)\n- \"Where is X?\" (location)\n- \"Who holds Y?\" (assignment)\n- \"Items added this week\" (time)",
    ),
    (
        "çalışmıyor",
        "Üzgünüm, bir sorun yaşıyorsunuz. Sorunuzu farklı bir şekilde ifade etmeyi deneyin veya sistem yöneticisiyle iletişime geçin.",
    ),
    (
        "not working",
        "Sorry you're having trouble. Try rephrasing your question or contact the system administrator.",
    ),
    (
        "hata",
        "Bir hata oluştu. Sorunuzu daha basit sormayı deneyin, örneğin: \"Boştaki monitörler\"",
    ),
    (
        "error",
        "An error occurred. Try asking in a simpler way, for example: \"Available monitors\"",
    ),
];

async fn seed_fallback_responses(db: &DatabaseConnection) -> Result<(), DbErr> {
    if chatbot_fallback_response::Entity::find().count(db).await? > 0 {
        return Ok(());
    }

    let now = clock::now_ts();
    let rows = FALLBACK_RESPONSES
        .iter()
        .map(|(keyword, text)| chatbot_fallback_response::ActiveModel {
            trigger_keyword: Set(keyword.to_string()),
            response_text: Set(text.to_string()),
            is_active: Set(true),
            usage_count: Set(0),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        });
    chatbot_fallback_response::Entity::insert_many(rows).exec(db).await?;
    tracing::info!("Seeded {} chatbot fallback responses", FALLBACK_RESPONSES.len());
    Ok(())
}
