use sea_orm::*;

use crate::auth::hash_password;
use crate::domain::status::{ItemCondition, ItemStatus};
use crate::domain::{clock, Role};
use crate::models::{category, item, role, user, vendor};

/// Demo accounts, all sharing the same password
const DEMO_USERS: &[(&str, &str, Role)] = &[
    ("Lab Admin", "admin@lab.edu", Role::Admin),
    ("Inventory Manager", "manager@lab.edu", Role::InventoryManager),
    ("Staff Member", "staff@lab.edu", Role::Staff),
];
const DEMO_PASSWORD: &str = "password123";

const LAPTOP_SCHEMA: &str = r#"{"fields":[
    {"name":"cpu","type":"text","label":"İşlemci","required":true},
    {"name":"ram_gb","type":"number","label":"RAM (GB)","required":true},
    {"name":"os","type":"select","label":"İşletim Sistemi","options":["Windows","Linux","macOS"]}
]}"#;

const MICROSCOPE_SCHEMA: &str = r#"{"fields":[
    {"name":"magnification","type":"text","label":"Büyütme","required":true}
]}"#;

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    if user::Entity::find().count(db).await? > 0 {
        tracing::info!("Users already present, skipping demo seed");
        return Ok(());
    }

    let now = clock::now_ts();
    let password_hash = hash_password(DEMO_PASSWORD).map_err(DbErr::Custom)?;

    // 1. Users
    for (name, email, user_role) in DEMO_USERS {
        let role_row = role::Entity::find()
            .filter(role::Column::RoleName.eq(user_role.name()))
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("role {}", user_role)))?;

        user::ActiveModel {
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.clone()),
            role_id: Set(role_row.id),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    // 2. Categories
    let laptops = category::ActiveModel {
        category_name: Set("Dizüstü Bilgisayar".to_owned()),
        description: Set(Some("Öğrenci ve personel kullanımı için dizüstü bilgisayarlar".to_owned())),
        schema_definition: Set(Some(LAPTOP_SCHEMA.to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let microscopes = category::ActiveModel {
        category_name: Set("Mikroskop".to_owned()),
        description: Set(Some("Laboratuvar mikroskopları".to_owned())),
        schema_definition: Set(Some(MICROSCOPE_SCHEMA.to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    // 3. Vendor
    let vendor = vendor::ActiveModel {
        vendor_name: Set("Bilim Teknik A.Ş.".to_owned()),
        contact_info: Set(Some("satis@bilimteknik.example".to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    // 4. Items
    let items = [
        ("LAP-001", "ThinkPad T14", laptops.id, "B-Blok 101", r#"{"cpu":"i7","ram_gb":16,"os":"Linux"}"#),
        ("LAP-002", "Dell Latitude 5440", laptops.id, "B-Blok 101", r#"{"cpu":"i5","ram_gb":8,"os":"Windows"}"#),
        ("MIC-001", "Olympus CX23", microscopes.id, "Biyoloji Lab 2", r#"{"magnification":"1000x"}"#),
    ];

    for (number, name, category_id, location, specs) in items {
        item::ActiveModel {
            inventory_number: Set(number.to_owned()),
            name: Set(name.to_owned()),
            category_id: Set(category_id),
            vendor_id: Set(Some(vendor.id)),
            location: Set(location.to_owned()),
            status: Set(ItemStatus::Available.as_str().to_owned()),
            condition_status: Set(Some(ItemCondition::Used.as_str().to_owned())),
            specifications: Set(Some(specs.to_owned())),
            current_holder_id: Set(None),
            is_active: Set(true),
            purchase_date: Set(None),
            purchase_value: Set(None),
            warranty_expiry_date: Set(None),
            deleted_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    tracing::info!(users = DEMO_USERS.len(), "Demo data created");
    Ok(())
}
