use std::sync::Arc;

use propwire::{bindable, Bean, Config, ContainerBuilder};

#[derive(Debug, Default)]
struct AppSection {
    name: String,
    debug: bool,
}

bindable!(AppSection {
    name: "${name}",
    debug: "${debug:=false}",
});

#[derive(Debug, Default)]
struct Database {
    url: String,
    pool: u32,
}

bindable!(Database {
    url: "${url}",
    pool: "${pool:=4}",
});

struct Repository {
    db: Arc<Database>,
}

fn main() -> Result<(), propwire::Error> {
    let props = Config::builder()
        .with_file("demos/default.toml", true)
        .with_file("demos/dev.toml", false)
        .with_env("APP", "__")
        .build()?;

    let container = ContainerBuilder::new()
        .with_properties(props)
        .bean(Bean::object(AppSection::default()).bind("${app}"))
        .bean(Bean::object(Database::default()).bind("${database}"))
        .bean(Bean::from_fn(|db: Arc<Database>| Repository { db }))
        .refresh()?;

    let app = container.get::<AppSection>("")?;
    let repo = container.get::<Repository>("")?;
    println!("App: {} (debug={})", app.name, app.debug);
    println!("Database URL: {} (pool={})", repo.db.url, repo.db.pool);

    container.close();
    Ok(())
}
