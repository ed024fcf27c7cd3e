//! 本地口令哈希工具：生成 `auth.users[].password_hash` 配置值
//!
//! 口令优先取 `--password`，否则从标准输入读取一行。

use std::env;
use std::fmt::{Display, Formatter};
use std::io::BufRead;

use qr_backend::features::auth::credentials::{DEFAULT_ROUNDS, hash_password};

#[derive(Debug, Default)]
struct Args {
    help: bool,
    rounds: Option<u32>,
    password: Option<String>,
}

#[derive(Debug)]
enum CliError {
    Args(String),
    Input(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Args(msg) => write!(f, "参数错误: {msg}"),
            CliError::Input(msg) => write!(f, "读取口令失败: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl Args {
    fn parse(raw: Vec<String>) -> Result<Self, CliError> {
        let mut args = Args::default();
        let mut it = raw.into_iter();
        while let Some(flag) = it.next() {
            match flag.as_str() {
                "-h" | "--help" => args.help = true,
                "--rounds" => {
                    let v = it
                        .next()
                        .ok_or_else(|| CliError::Args("--rounds 缺少取值".into()))?;
                    let n: u32 = v
                        .parse()
                        .map_err(|_| CliError::Args(format!("--rounds 不是正整数: {v}")))?;
                    if n == 0 {
                        return Err(CliError::Args("--rounds 必须大于 0".into()));
                    }
                    args.rounds = Some(n);
                }
                "--password" => {
                    args.password = Some(
                        it.next()
                            .ok_or_else(|| CliError::Args("--password 缺少取值".into()))?,
                    );
                }
                other => return Err(CliError::Args(format!("未知参数: {other}"))),
            }
        }
        Ok(args)
    }
}

fn read_password_from_stdin() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CliError::Input(e.to_string()))?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(CliError::Input("口令为空".into()));
    }
    Ok(password)
}

fn print_help() {
    println!(
        r#"hash_password（生成登录口令哈希）

参数：
  --password PW     明文口令（缺省时从标准输入读取一行）
  --rounds N        PBKDF2 迭代次数（默认 {DEFAULT_ROUNDS}）
  -h, --help        显示帮助

输出可直接填入 config.toml 的 auth.users[].password_hash。"#
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(env::args().skip(1).collect())?;
    if args.help {
        print_help();
        return Ok(());
    }

    let password = match args.password {
        Some(pw) => pw,
        None => read_password_from_stdin()?,
    };
    println!("{}", hash_password(&password, args.rounds.unwrap_or(DEFAULT_ROUNDS)));
    Ok(())
}
