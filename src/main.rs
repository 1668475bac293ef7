mod api;
mod config;
mod draft;
mod http;
mod models;
mod photos;
mod session;
mod storage;

use api::ApiClient;
use config::{ApiConfig, StorageConfig};
use draft::{
    build_payload, draft_from_product, is_dirty, merge_photo_files, product_from_payload,
    remove_first_photo_match,
};
use models::{AuthSession, Draft, OrderStatus, Product};
use photos::{normalize_photo_text, photos_to_text};
use session::SessionStore;
use storage::{PhotoUpload, SupabaseStorage, delete_photo, upload_photos};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    if let Err(err) = run().await {
        error!(target = "cafe.console", "console crashed: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).try_init();
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let session_store = SessionStore::from_env();
    let mut console = Console {
        api: ApiClient::new(&ApiConfig::from_env()),
        storage: SupabaseStorage::new(StorageConfig::from_env()),
        session: session_store.load(),
        session_store,
        products: Vec::new(),
        selected: None,
        draft: None,
        staged: Vec::new(),
    };

    // A stored session belonging to a non-administrator is not usable here.
    if !console.session.token.is_empty() {
        let is_admin = console
            .session
            .user
            .as_ref()
            .is_some_and(models::User::is_admin);
        if is_admin {
            console.api.set_token(Some(console.session.token.clone()));
            let label = console
                .session
                .user
                .as_ref()
                .map(models::User::label)
                .unwrap_or_default();
            println!("resumed session for {label}");
        } else {
            console.session_store.clear()?;
            console.session = AuthSession::default();
            println!("403: stored session is not an administrator, signed out");
        }
    }

    println!("cafe admin console; `help` lists commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        console.dispatch(&line).await;
    }
    Ok(())
}

async fn prompt() -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await
}

struct Console {
    api: ApiClient,
    storage: SupabaseStorage,
    session_store: SessionStore,
    session: AuthSession,
    products: Vec<Product>,
    selected: Option<i64>,
    draft: Option<Draft>,
    staged: Vec<draft::PendingPhotoFile>,
}

impl Console {
    async fn dispatch(&mut self, line: &str) {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let result = match command {
            "help" => {
                print_help();
                Ok(())
            }
            "login" => self.login(rest).await,
            "logout" => self.logout(),
            "products" => self.list_products().await,
            "select" => self.select(rest),
            "show" => self.show(),
            "set" => self.set_field(rest),
            "photos" => self.show_photos(),
            "stage" => self.stage(rest).await,
            "unstage" => {
                self.staged.clear();
                println!("staged files cleared");
                Ok(())
            }
            "delete-photo" => self.remove_photo(rest).await,
            "save" => self.save().await,
            "orders" => self.list_orders().await,
            "order" => self.show_order(rest).await,
            "status" => self.set_order_status(rest).await,
            "address" => self.show_address(rest).await,
            _ => {
                println!("unknown command `{command}`; `help` lists commands");
                Ok(())
            }
        };

        if let Err(message) = result {
            println!("error: {message}");
        }
    }

    async fn login(&mut self, rest: &str) -> Result<(), String> {
        let Some((login, password)) = rest.split_once(char::is_whitespace) else {
            return Err("usage: login <user> <password>".into());
        };
        let session = self
            .api
            .login(login.trim(), password.trim())
            .await
            .map_err(|err| format!("login failed: {err}"))?;

        let is_admin = session.user.as_ref().is_some_and(models::User::is_admin);
        if !is_admin {
            self.api.set_token(None);
            let _ = self.session_store.clear();
            return Err("403: administrator access only".into());
        }

        let _ = self
            .session_store
            .save(&session.token, session.user.as_ref());
        let label = session
            .user
            .as_ref()
            .map(models::User::label)
            .unwrap_or_default();
        self.session = session;
        println!("logged in as {label}");
        Ok(())
    }

    fn logout(&mut self) -> Result<(), String> {
        self.session_store
            .clear()
            .map_err(|err| format!("could not clear session: {err}"))?;
        self.session = AuthSession::default();
        self.api.set_token(None);
        self.products.clear();
        self.selected = None;
        self.draft = None;
        self.staged.clear();
        println!("logged out");
        Ok(())
    }

    async fn list_products(&mut self) -> Result<(), String> {
        self.products = self
            .api
            .fetch_products()
            .await
            .map_err(|err| format!("could not load products: {err}"))?;
        for product in &self.products {
            let marker = if product.available { "+" } else { "-" };
            println!(
                "[{marker}] #{} {} ({}) {} rub, {} photos",
                product.id,
                product.name,
                product.category,
                product.price,
                product.photos.len()
            );
        }
        println!("{} products", self.products.len());
        Ok(())
    }

    fn select(&mut self, rest: &str) -> Result<(), String> {
        let id: i64 = rest.parse().map_err(|_| "usage: select <product-id>")?;
        let product = self
            .products
            .iter()
            .find(|product| product.id == id)
            .ok_or("no such product; run `products` first")?;
        self.draft = Some(draft_from_product(product));
        self.selected = Some(id);
        self.staged.clear();
        println!("editing #{id} {}", product.name);
        Ok(())
    }

    fn current_draft(&mut self) -> Result<&mut Draft, String> {
        self.draft.as_mut().ok_or_else(|| "no product selected".into())
    }

    fn show(&mut self) -> Result<(), String> {
        let dirty = self.draft_is_dirty();
        let draft = self.current_draft()?;
        println!("id:            {}", draft.id);
        println!("name:          {}", draft.name);
        println!("category:      {}", draft.category);
        println!("description:   {}", draft.description);
        println!("available:     {}", draft.available);
        println!("price:         {}", draft.price);
        println!("weight:        {}", draft.weight);
        println!("calories:      {}", draft.calories);
        println!("proteins:      {}", draft.proteins);
        println!("fats:          {}", draft.fats);
        println!("carbohydrates: {}", draft.carbohydrates);
        println!("photos:        {}", normalize_photo_text(&draft.photos_text).len());
        println!("modified:      {dirty}");
        Ok(())
    }

    fn draft_is_dirty(&self) -> bool {
        match (&self.draft, self.selected) {
            (Some(draft), Some(id)) => self
                .products
                .iter()
                .find(|product| product.id == id)
                .map(|product| is_dirty(product, draft))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn set_field(&mut self, rest: &str) -> Result<(), String> {
        let Some((field, value)) = rest.split_once(char::is_whitespace) else {
            return Err("usage: set <field> <value>".into());
        };
        let value = value.trim();
        let draft = self.current_draft()?;
        match field {
            "name" => draft.name = value.to_string(),
            "category" => draft.category = value.to_string(),
            "description" => draft.description = value.to_string(),
            "available" => {
                draft.available = matches!(value, "true" | "yes" | "1");
            }
            "price" => draft.price = value.to_string(),
            "weight" => draft.weight = value.to_string(),
            "calories" => draft.calories = value.to_string(),
            "proteins" => draft.proteins = value.to_string(),
            "fats" => draft.fats = value.to_string(),
            "carbohydrates" => draft.carbohydrates = value.to_string(),
            "photos" => {
                draft.photos_text = value.to_string();
                draft.photos = normalize_photo_text(&draft.photos_text);
            }
            _ => return Err(format!("unknown field `{field}`")),
        }
        Ok(())
    }

    fn show_photos(&mut self) -> Result<(), String> {
        let draft = self.current_draft()?;
        let urls = normalize_photo_text(&draft.photos_text);
        for (index, url) in urls.iter().enumerate() {
            println!("{index}: {url}");
        }
        if urls.is_empty() {
            println!("no photos");
        }
        for file in &self.staged {
            println!("staged: {} ({} bytes)", file.name, file.size);
        }
        Ok(())
    }

    async fn stage(&mut self, rest: &str) -> Result<(), String> {
        if rest.is_empty() {
            return Err("usage: stage <file>".into());
        }
        self.current_draft()?;
        let path = std::path::PathBuf::from(rest);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|err| format!("cannot stage {rest}: {err}"))?;
        if !meta.is_file() {
            return Err(format!("cannot stage {rest}: not a file"));
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or("cannot stage: unreadable file name")?
            .to_string();
        let staged = draft::PendingPhotoFile {
            name,
            size: meta.len(),
            modified: meta.modified().map_err(|err| err.to_string())?,
            path,
        };
        self.staged = merge_photo_files(&self.staged, &[staged]);
        println!("{} file(s) staged", self.staged.len());
        Ok(())
    }

    async fn remove_photo(&mut self, rest: &str) -> Result<(), String> {
        let index: usize = rest.parse().map_err(|_| "usage: delete-photo <index>")?;
        let draft = self.draft.as_ref().ok_or("no product selected")?;
        let urls = normalize_photo_text(&draft.photos_text);
        let target = urls
            .get(index)
            .cloned()
            .ok_or_else(|| format!("no photo at index {index}"))?;

        let outcome = delete_photo(&self.storage, self.storage.config(), &target, draft.id)
            .await
            .map_err(|err| format!("photo deletion failed: {err}"))?;

        let draft = self.current_draft()?;
        let next = remove_first_photo_match(&normalize_photo_text(&draft.photos_text), &target);
        draft.photos_text = photos_to_text(&next);
        draft.photos = next;
        println!("photo removed from product; {}", outcome.describe());
        Ok(())
    }

    async fn save(&mut self) -> Result<(), String> {
        let staged = self.staged.clone();
        let dirty = self.draft_is_dirty();
        let draft = self.draft.as_mut().ok_or("no product selected")?;
        if !dirty && staged.is_empty() {
            return Err("nothing to save".into());
        }

        if !staged.is_empty() {
            let mut files = Vec::with_capacity(staged.len());
            for file in &staged {
                let bytes = tokio::fs::read(&file.path)
                    .await
                    .map_err(|err| format!("failed to read \"{}\": {err}", file.name))?;
                files.push(PhotoUpload {
                    file_name: file.name.clone(),
                    content_type: content_type_for(&file.name),
                    bytes,
                });
            }
            let uploaded = upload_photos(&self.storage, self.storage.config(), draft.id, &files)
                .await
                .map_err(|err| err.to_string())?;
            let mut merged = normalize_photo_text(&draft.photos_text);
            merged.extend(uploaded);
            draft.photos_text = photos_to_text(&merged);
            draft.photos = merged;
            println!("{} photo(s) uploaded", staged.len());
        }

        let payload = build_payload(draft);
        self.api
            .update_product(&payload)
            .await
            .map_err(|err| format!("save failed: {err}"))?;

        let updated = product_from_payload(&payload);
        if let Some(slot) = self
            .products
            .iter_mut()
            .find(|product| product.id == payload.id)
        {
            *slot = updated;
        }
        self.staged.clear();
        println!("saved #{}", payload.id);
        Ok(())
    }

    async fn list_orders(&mut self) -> Result<(), String> {
        let orders = self
            .api
            .fetch_orders()
            .await
            .map_err(|err| format!("could not load orders: {err}"))?;
        for order in &orders {
            let date = order
                .created_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} | {date} | {} | {} rub | {} item(s) | {}",
                order.short_id(),
                order.user_label(),
                order.total_price,
                order.items_count,
                order.status
            );
        }
        println!("{} orders", orders.len());
        Ok(())
    }

    async fn show_order(&mut self, rest: &str) -> Result<(), String> {
        if rest.is_empty() {
            return Err("usage: order <order-id>".into());
        }
        let orders = self
            .api
            .fetch_orders()
            .await
            .map_err(|err| format!("could not load orders: {err}"))?;
        let order = orders
            .iter()
            .find(|order| order.id == rest)
            .ok_or("no such order")?;

        println!("order {}", order.id);
        println!("status:  {}", order.status);
        println!("user:    {}", order.user_label());
        if !order.comment.is_empty() {
            println!("comment: {}", order.comment);
        }
        for item in &order.items {
            println!(
                "  {} x{} = {} rub",
                item.label(),
                models::value_text(&item.qty).unwrap_or_else(|| "1".into()),
                models::value_text(&item.sum).unwrap_or_else(|| "?".into()),
            );
        }
        let address = match (&order.address, order.address_id) {
            (Some(address), _) => Some(address.clone()),
            (None, Some(address_id)) => self
                .api
                .fetch_address(address_id)
                .await
                .map_err(|err| format!("could not load address: {err}"))?,
            (None, None) => None,
        };
        match address {
            Some(address) => println!("address: {}", address.format()),
            None => println!("address: -"),
        }
        Ok(())
    }

    async fn set_order_status(&mut self, rest: &str) -> Result<(), String> {
        let Some((order_id, raw_status)) = rest.split_once(char::is_whitespace) else {
            return Err("usage: status <order-id> <new|processing|shipped|delivered|cancelled>".into());
        };
        let Some(status) = OrderStatus::from_raw(raw_status) else {
            let all = OrderStatus::ALL.map(|status| status.as_str()).join("|");
            return Err(format!("unknown status `{raw_status}`; expected one of {all}"));
        };
        self.api
            .update_order_status(order_id.trim(), status)
            .await
            .map_err(|err| format!("could not update order: {err}"))?;
        println!("order {order_id} -> {status}");
        Ok(())
    }

    async fn show_address(&mut self, rest: &str) -> Result<(), String> {
        let address_id: i64 = rest.parse().map_err(|_| "usage: address <address-id>")?;
        let address = self
            .api
            .fetch_address(address_id)
            .await
            .map_err(|err| format!("could not load address: {err}"))?;
        match address {
            Some(address) => println!("{}", address.format()),
            None => println!("no address #{address_id}"),
        }
        Ok(())
    }
}

fn content_type_for(file_name: &str) -> Option<String> {
    let extension = file_name.rsplit('.').next()?.to_lowercase();
    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(content_type.to_string())
}

fn print_help() {
    println!("login <user> <password>   sign in (administrators only)");
    println!("logout                    sign out and clear the stored session");
    println!("products                  list catalog products");
    println!("select <id>               start editing a product");
    println!("show                      show the current draft");
    println!("set <field> <value>       edit a draft field (photos edits the url list)");
    println!("photos                    list draft photo urls and staged files");
    println!("stage <file>              stage a local image for upload on save");
    println!("unstage                   drop all staged files");
    println!("delete-photo <index>      remove a photo from storage and the draft");
    println!("save                      upload staged photos and persist the draft");
    println!("orders                    list orders");
    println!("order <id>                show one order with items and address");
    println!("status <id> <status>      update an order status");
    println!("address <id>              look up a delivery address");
    println!("quit                      leave the console");
}
