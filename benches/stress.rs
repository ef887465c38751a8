use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use tokio_postgres::{Client, Config, NoTls};
use ulid::Ulid;

const HOUR: i64 = 3_600_000;

async fn connect(host: &str, port: u16, password: &str) -> Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname("salonbook")
        .user("bench")
        .password(password);

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// One artist paired with one chair; each pair books independently.
#[derive(Clone, Copy)]
struct Pair {
    artist: Ulid,
    chair: Ulid,
}

#[derive(Clone)]
struct Salon {
    location: Ulid,
    cut: Ulid,
    pairs: Vec<Pair>,
}

/// Midnight UTC on the first benchmark day, far enough out to never be past.
fn base() -> i64 {
    Utc.with_ymd_and_hms(2040, 1, 2, 0, 0, 0)
        .single()
        .map(|d| d.timestamp_millis())
        .unwrap_or(2_209_161_600_000)
}

/// Hour offset that skips 23:00, which would run past the 23:59 close.
fn hour_slot(i: usize) -> i64 {
    let day = (i / 23) as i64;
    let hour = (i % 23) as i64;
    base() + day * 24 * HOUR + hour * HOUR
}

async fn setup(client: &Client, n_pairs: usize) -> Salon {
    let location = Ulid::new();
    let cut = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO locations VALUES ('{location}', 'Bench', 'UTC', 'daily 00:00-23:59')"
        ))
        .await
        .unwrap();
    client
        .batch_execute(&format!("INSERT INTO services VALUES ('{cut}', 'Cut', 60, 4500)"))
        .await
        .unwrap();

    let mut pairs = Vec::with_capacity(n_pairs);
    for i in 0..n_pairs {
        let pair = Pair {
            artist: Ulid::new(),
            chair: Ulid::new(),
        };
        client
            .batch_execute(&format!(
                "INSERT INTO staff VALUES ('{}', '{location}', 'artist', 'Artist {i}')",
                pair.artist
            ))
            .await
            .unwrap();
        client
            .batch_execute(&format!(
                "INSERT INTO resources VALUES ('{}', '{location}', 'Chair {i}', 'station', 1)",
                pair.chair
            ))
            .await
            .unwrap();
        pairs.push(pair);
    }
    println!("  created 1 location, {n_pairs} artists, {n_pairs} chairs");
    Salon {
        location,
        cut,
        pairs,
    }
}

fn booking_sql(salon: &Salon, pair: Pair, start: i64) -> String {
    format!(
        "INSERT INTO bookings VALUES ('{}', '{}', '{}', {start}, '{}', NULL, '{}', 'staff_console')",
        Ulid::new(),
        salon.cut,
        salon.location,
        pair.artist,
        pair.chair
    )
}

async fn phase1_sequential(client: &Client, salon: &Salon) {
    let n = 2000;
    let pair = salon.pairs[0];
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        client
            .batch_execute(&booking_sql(salon, pair, hour_slot(i)))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("commit latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16, password: &str, salon: &Salon) {
    let n_per_task = 200;
    let start = Instant::now();
    let mut handles = Vec::new();

    // Each task owns a pair, so commits never contend for a lane.
    for pair in salon.pairs.iter().skip(1).copied() {
        let host = host.to_string();
        let password = password.to_string();
        let salon = salon.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &password).await;
            for j in 0..n_per_task {
                client
                    .batch_execute(&booking_sql(&salon, pair, hour_slot(j)))
                    .await
                    .unwrap();
            }
        }));
    }
    let n_tasks = handles.len();
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_slots_under_load(host: &str, port: u16, password: &str, salon: &Salon) {
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for (w, pair) in salon.pairs.iter().skip(1).take(4).copied().enumerate() {
        let host = host.to_string();
        let password = password.to_string();
        let salon = salon.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &password).await;
            let mut i = 10_000 + w * 10_000;
            while !stop.load(Ordering::Relaxed) {
                let _ = client.batch_execute(&booking_sql(&salon, pair, hour_slot(i))).await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 300;
    let mut reader_handles = Vec::new();
    for r in 0..n_readers {
        let host = host.to_string();
        let password = password.to_string();
        let salon = salon.clone();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &password).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for k in 0..reads_per_reader {
                let day = chrono::DateTime::from_timestamp_millis(base() + ((r + k) % 60) as i64 * 24 * HOUR)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "2040-01-02".into());
                let t = Instant::now();
                client
                    .batch_execute(&format!(
                        "SELECT * FROM slots WHERE location_id = '{}' AND service_id = '{}' AND date = '{day}' AND granularity = 15",
                        salon.location, salon.cut
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }
    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }
    print_latency("slot query", &mut all_latencies);
}

async fn phase4_contention(host: &str, port: u16, password: &str, salon: &Salon) {
    let n_clients = 50;
    let n_slots = 20;
    let pair = salon.pairs[0];
    let won = Arc::new(AtomicUsize::new(0));
    let lost = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..n_clients {
        let host = host.to_string();
        let password = password.to_string();
        let salon = salon.clone();
        let won = won.clone();
        let lost = lost.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &password).await;
            // Well past phase 1, so every slot starts free.
            for s in 0..n_slots {
                match client.batch_execute(&booking_sql(&salon, pair, hour_slot(50_000 + s))).await {
                    Ok(()) => won.fetch_add(1, Ordering::Relaxed),
                    Err(_) => lost.fetch_add(1, Ordering::Relaxed),
                };
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let won = won.load(Ordering::Relaxed);
    let lost = lost.load(Ordering::Relaxed);
    println!(
        "  {n_clients} clients racing for {n_slots} slots: {won} committed, {lost} refused in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    if won != n_slots {
        println!("  WARNING: expected exactly {n_slots} commits");
    }
}

#[tokio::main]
async fn main() {
    let host = std::env::var("SALONBOOK_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("SALONBOOK_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid SALONBOOK_PORT");
    let password = std::env::var("SALONBOOK_PASSWORD").unwrap_or_else(|_| "salonbook".into());

    println!("=== salonbook stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[setup]");
    let client = connect(&host, port, &password).await;
    let salon = setup(&client, 11).await;

    println!("\n[phase 1] sequential commit throughput");
    phase1_sequential(&client, &salon).await;

    println!("\n[phase 2] concurrent commits on disjoint lanes");
    phase2_concurrent(&host, port, &password, &salon).await;

    println!("\n[phase 3] slot query latency under write load");
    phase3_slots_under_load(&host, port, &password, &salon).await;

    println!("\n[phase 4] contended commits");
    phase4_contention(&host, port, &password, &salon).await;

    println!("\n=== benchmark complete ===");
}
