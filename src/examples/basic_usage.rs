use taskserver::tasks::{fun_pow, fun_sin, fun_sqrt};
use taskserver::{logger, Server, TaskStatus};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logger::init("info");

    // Create the server; the worker thread starts right away
    let server: Server<f64> = Server::in_memory()?;

    // Submit three bound callables from this thread
    let ids = [
        server.submit(|| fun_sin(0.0)),
        server.submit(|| fun_sqrt(4.0)),
        server.submit(|| fun_pow(2.0, 3.0)),
    ];
    println!("Submitted task ids: {:?}", ids);

    for id in ids {
        let value = server.request_result(id)?;
        println!("Task {} -> {} ({})", id, value, server.status(id));
    }

    server.stop();

    // A task submitted after stop is abandoned, never answered with a value
    let late = server.submit(|| fun_sqrt(9.0));
    assert_eq!(server.status(late), TaskStatus::Abandoned);
    match server.request_result(late) {
        Ok(v) => println!("Task {} unexpectedly returned {}", late, v),
        Err(e) => println!("Task {}: {}", late, e),
    }

    println!("exit..");
    Ok(())
}
