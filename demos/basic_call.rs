//! Basic usage: describe an interface, bind it, invoke operations.
//!
//! Run with: cargo run --example basic_call

use serde::Deserialize;
use veneer::{Arg, InterfaceDef, MethodDef, ParamDef, ReturnType, Veneer};

#[derive(Debug, Deserialize)]
struct Contributor {
    login: String,
    contributions: u32,
}

#[tokio::main]
async fn main() -> Result<(), veneer::Error> {
    // The interface description plays the role annotations play elsewhere: one
    // operation, a templated request line, and a class-wide Accept header.
    let github = InterfaceDef::new("GitHub")
        .headers(["Accept: application/vnd.github.v3+json"])
        .method(
            MethodDef::new("contributors")
                .request_line("GET /repos/{owner}/{repo}/contributors")
                .returns(ReturnType::named("Vec<Contributor>"))
                .param(ParamDef::new("owner", "String").bind("owner"))
                .param(ParamDef::new("repo", "String").bind("repo")),
        );

    let api = Veneer::builder()
        .request_interceptor(|template: &mut veneer::RequestTemplate| {
            template.header("User-Agent", ["veneer-demo".to_string()]);
        })
        .target(github, "https://api.github.com")?;

    let contributors: Vec<Contributor> = api
        .invoke("contributors", vec![Arg::from("rust-lang"), Arg::from("cargo")])
        .await?;

    for contributor in contributors.iter().take(10) {
        println!("{:>6}  {}", contributor.contributions, contributor.login);
    }
    Ok(())
}
