mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use common::{call, database_ready, get, post_json, send_json};
use serde_json::{json, Value};

async fn expire_link(table: &str, id: &str) -> Result<()> {
    let pool = hr_api::database::DatabaseManager::pool().await?;
    let sql = format!("UPDATE {} SET expires_at = now() - interval '1 hour' WHERE id = $1", table);
    sqlx::query(&sql).bind(uuid::Uuid::parse_str(id)?).execute(&pool).await?;
    Ok(())
}

async fn register(email: &str) -> Result<String> {
    let (status, body) = call(post_json(
        "/auth/register",
        None,
        &json!({ "name": "RH Central", "email": email, "password": "segredo-forte" }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    Ok(body["data"]["token"].as_str().context("token missing")?.to_string())
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().unwrap_or_default().to_string()
}

// One test drives the whole flow so the process-wide pool stays on a single runtime.
#[tokio::test]
async fn associate_lifecycle_forms_and_links() -> Result<()> {
    if !database_ready().await {
        return Ok(());
    }

    let email = format!("rh-{}@empresa.com.br", uuid::Uuid::new_v4().simple());
    let token = register(&email).await?;
    let token = token.as_str();

    // Duplicate email
    let (status, _) = call(post_json(
        "/auth/register",
        None,
        &json!({ "name": "Outro", "email": email.to_uppercase(), "password": "segredo-forte" }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(post_json("/auth/login", None, &json!({ "email": email, "password": "errada!!" }))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(get("/api/auth/whoami", Some(token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], email.as_str());

    // Registration numbers start at 1000 and increase per admin
    let (status, first) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "data": { "nome": "João da Silva", "cidade": "Recife" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    assert_eq!(first["data"]["attributes"]["matricula"], 1000);
    assert_eq!(first["data"]["status"], "active");
    let first_id = id_of(&first);

    let (status, second) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "data": { "nome": "Maria Souza", "cidade": "Olinda", "email": "maria@exemplo.com" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["data"]["attributes"]["matricula"], 1001);
    let second_id = id_of(&second);

    let (status, _) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "data": { "nome": "Repetido", "matricula": "1000" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // Free-text search
    let (status, page) = call(get("/api/associates?q=nome%20jo%C3%A3o", Some(token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 1);
    assert_eq!(page["data"]["items"][0]["id"], first_id.as_str());

    let (status, page) = call(post_json(
        "/api/associates/search",
        Some(token),
        &json!({ "q": "matricula >= 1000", "order": "matricula desc" }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 2);
    assert_eq!(page["data"]["items"][0]["id"], second_id.as_str());

    // Paging over the query string
    let (status, page) = call(get("/api/associates?order=matricula&limit=1&offset=1", Some(token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 2);
    assert_eq!(page["data"]["limit"], 1);
    assert_eq!(page["data"]["offset"], 1);
    assert_eq!(page["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["data"]["items"][0]["id"], second_id.as_str());

    // Patch keeps the registration number
    let (status, patched) = call(send_json(
        "PATCH",
        &format!("/api/associates/{}", first_id),
        Some(token),
        &json!({ "data": { "cargo": "Analista" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["data"]["attributes"]["cargo"], "Analista");
    assert_eq!(patched["data"]["attributes"]["matricula"], 1000);

    // Put replaces the document but keeps the registration number
    let (status, replaced) = call(send_json(
        "PUT",
        &format!("/api/associates/{}", first_id),
        Some(token),
        &json!({ "data": { "nome": "João da Silva", "cidade": "Caruaru" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", replaced);
    assert_eq!(replaced["data"]["attributes"]["matricula"], 1000);
    assert_eq!(replaced["data"]["attributes"]["cidade"], "Caruaru");
    assert!(replaced["data"]["attributes"].get("cargo").is_none());

    // Lifecycle
    let deactivate = format!("/api/associates/{}/deactivate", first_id);
    let (status, body) = call(post_json(&deactivate, Some(token), &json!({ "reason": "Desligamento" }))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "inactive");
    let (status, _) = call(post_json(&deactivate, Some(token), &json!({}))?).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, page) = call(get("/api/associates?status=inactive", Some(token))?).await?;
    assert_eq!(page["data"]["total"], 1);

    // Form links create associates without authentication
    let (status, form) = call(post_json(
        "/api/forms",
        Some(token),
        &json!({
            "name": "Admissão",
            "fields": [
                { "key": "nome", "label": "Nome", "kind": "text", "required": true },
                { "key": "email", "label": "E-mail", "kind": "email" }
            ]
        }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", form);
    let form_id = id_of(&form);

    let (status, link) = call(post_json(&format!("/api/forms/{}/links", form_id), Some(token), &json!({}))?).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", link);
    let link_token = link["data"]["token"].as_str().context("link token missing")?.to_string();
    let link_id = id_of(&link);

    let public = format!("/public/forms/{}", link_token);
    let (status, body) = call(get(&public, None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Admissão");

    let (status, _) = call(post_json(&public, None, &json!({ "data": { "email": "x@y.com" } }))?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, created) = call(post_json(&public, None, &json!({ "data": { "nome": "Carla Dias" } }))?).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["data"]["attributes"]["matricula"], 1002);

    let (status, _) = call(send_json(
        "DELETE",
        &format!("/api/forms/{}/links/{}", form_id, link_id),
        Some(token),
        &json!({}),
    )?)
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(get(&public, None)?).await?;
    assert_eq!(status, StatusCode::GONE);

    let (status, link) = call(post_json(&format!("/api/forms/{}/links", form_id), Some(token), &json!({}))?).await?;
    assert_eq!(status, StatusCode::CREATED);
    let expired_public = format!("/public/forms/{}", link["data"]["token"].as_str().unwrap_or_default());
    expire_link("form_links", &id_of(&link)).await?;
    let (status, _) = call(get(&expired_public, None)?).await?;
    assert_eq!(status, StatusCode::GONE);

    // Records keep working after their form is deleted
    let (status, from_form) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "form_id": form_id, "data": { "nome": "Ana Lima" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", from_form);
    let from_form_path = format!("/api/associates/{}", id_of(&from_form));

    let (status, _) = call(send_json("DELETE", &format!("/api/forms/{}", form_id), Some(token), &json!({}))?).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(send_json(
        "PATCH",
        &from_form_path,
        Some(token),
        &json!({ "data": { "cargo": "Gerente" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["attributes"]["cargo"], "Gerente");

    let (status, body) = call(send_json(
        "PUT",
        &from_form_path,
        Some(token),
        &json!({ "data": { "nome": "Ana Lima Costa" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    // Naming a deleted form explicitly is still refused
    let (status, _) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "form_id": form_id, "data": { "nome": "Bruno Alves" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Custom field links are single use
    let (status, field) = call(post_json(
        "/api/custom-fields",
        Some(token),
        &json!({ "key": "tamanho_camiseta", "label": "Tamanho", "kind": "select", "options": ["P", "M", "G"] }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", field);
    let field_id = id_of(&field);

    let (status, links) = call(post_json(
        &format!("/api/custom-fields/{}/links", field_id),
        Some(token),
        &json!({ "associate_ids": [second_id] }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", links);
    assert_eq!(links["data"][0]["notified"], true);
    let field_token = links["data"][0]["token"].as_str().context("field token missing")?.to_string();

    let public_field = format!("/public/fields/{}", field_token);
    let (status, body) = call(get(&public_field, None)?).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["field"]["key"], "tamanho_camiseta");
    assert_eq!(body["data"]["associate"], "Maria Souza");

    let (status, _) = call(post_json(&public_field, None, &json!({ "value": "XG" }))?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = call(post_json(&public_field, None, &json!({ "value": "M" }))?).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(post_json(&public_field, None, &json!({ "value": "G" }))?).await?;
    assert_eq!(status, StatusCode::GONE);

    let (_, record) = call(get(&format!("/api/associates/{}", second_id), Some(token))?).await?;
    assert_eq!(record["data"]["attributes"]["tamanho_camiseta"], "M");

    let (status, links) = call(post_json(
        &format!("/api/custom-fields/{}/links", field_id),
        Some(token),
        &json!({ "associate_ids": [second_id] }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let expired_field = format!("/public/fields/{}", links["data"][0]["token"].as_str().unwrap_or_default());
    expire_link("field_links", links["data"][0]["id"].as_str().unwrap_or_default()).await?;
    let (status, _) = call(get(&expired_field, None)?).await?;
    assert_eq!(status, StatusCode::GONE);
    let (status, _) = call(post_json(&expired_field, None, &json!({ "value": "P" }))?).await?;
    assert_eq!(status, StatusCode::GONE);

    // Soft delete
    let record_path = format!("/api/associates/{}", second_id);
    let (status, _) = call(send_json("DELETE", &record_path, Some(token), &json!({}))?).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(get(&record_path, Some(token))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Registration numbers stop at the cap instead of repeating
    let token = register(&format!("rh-{}@empresa.com.br", uuid::Uuid::new_v4().simple())).await?;
    let token = token.as_str();
    let (status, body) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "data": { "nome": "Penúltimo", "matricula": "999999999999999998" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = call(post_json("/api/associates", Some(token), &json!({ "data": { "nome": "Último" } }))?).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["attributes"]["matricula"], json!(999_999_999_999_999_999_i64));

    let (status, _) = call(post_json("/api/associates", Some(token), &json!({ "data": { "nome": "Excedente" } }))?).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(post_json(
        "/api/associates",
        Some(token),
        &json!({ "data": { "nome": "Manual", "matricula": "999999999999999999" } }),
    )?)
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["matricula"].is_string(), "{}", body);

    Ok(())
}
